// Generates the SupplierService client/server stubs from proto/supplier.proto.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::compile_protos("proto/supplier.proto")?;
    Ok(())
}
