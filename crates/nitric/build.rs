fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true) // Used by the end-to-end tests
        .build_client(true)
        .compile_protos(
            &[
                "proto/nitric/apis.proto",
                "proto/nitric/topics.proto",
                "proto/nitric/schedules.proto",
                "proto/nitric/storage.proto",
                "proto/nitric/websockets.proto",
                "proto/nitric/batch.proto",
                "proto/nitric/faas.proto",
            ],
            &["proto/"],
        )?;
    Ok(())
}
