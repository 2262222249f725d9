fn main() -> Result<(), Box<dyn std::error::Error>> {
    let file_descriptor_set = protox::compile(["proto/gnmi.proto"], ["proto"])
        .unwrap_or_else(|e| panic!("protobuf compile error: {e}"));

    tonic_build::configure()
        .type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]")
        .compile_fds(file_descriptor_set)
        .unwrap_or_else(|e| panic!("protobuf codegen error: {e}"));

    Ok(())
}
