fn main() {
    println!("Run `cargo test -p e2e` to execute the end-to-end upload tests.");
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use streamftp_client::{ClientOptions, Side, UploadClient, UploadError, send_file};
    use streamftp_hashing::digest_bytes;
    use streamftp_protocol::{
        Code, Digest, HashAlgorithm, UploadChunk, UploadFinish, UploadInit, UploadRequest,
    };
    use streamftp_rpc::RequestWriter;
    use streamftp_rpc::tcp::TcpCall;
    use streamftp_server::{ServerConfig, UploadServer, UploadService};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    /// A server on a loopback port, stopped on drop.
    struct Harness {
        server: Arc<UploadServer>,
        addr: SocketAddr,
        root: PathBuf,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        async fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = std::fs::canonicalize(dir.path()).unwrap();
            let config = ServerConfig {
                bind: ([127, 0, 0, 1], 0).into(),
                drain_timeout: Duration::from_secs(1),
            };
            let server = UploadServer::new(config, UploadService::new(&root).unwrap());
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let serving = Arc::clone(&server);
            tokio::spawn(async move {
                let _ = serving.serve(listener).await;
            });
            Self {
                server,
                addr,
                root,
                _dir: dir,
            }
        }

        fn client(&self, options: ClientOptions) -> UploadClient {
            UploadClient::new(self.addr.to_string(), options)
        }

        fn remote(&self, name: &str) -> PathBuf {
            self.root.join(name)
        }

        async fn call(&self) -> TcpCall {
            TcpCall::connect(self.addr, Duration::from_secs(5)).await.unwrap()
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.server.shutdown();
        }
    }

    /// Writes `len` bytes of a repeating pattern to a fresh local file.
    fn local_file(dir: &Path, len: usize) -> (PathBuf, Vec<u8>) {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let path = dir.join("source.bin");
        std::fs::write(&path, &data).unwrap();
        (path, data)
    }

    fn options(algorithm: HashAlgorithm) -> ClientOptions {
        ClientOptions {
            hash_algorithm: algorithm,
            connect_timeout: Duration::from_secs(5),
            ..ClientOptions::default()
        }
    }

    #[tokio::test]
    async fn upload_600k_with_sha256() {
        let harness = Harness::start().await;
        let local = tempfile::tempdir().unwrap();
        let (source, data) = local_file(local.path(), 600 * 1024);
        let remote = harness.remote("upload.bin");

        let response = harness
            .client(options(HashAlgorithm::Sha256))
            .upload_file(&source, &remote.display().to_string())
            .await
            .unwrap();

        assert_eq!(response.metadata.size, 614_400);
        assert_eq!(response.metadata.path, remote.display().to_string());
        let expected = digest_bytes(HashAlgorithm::Sha256, &data).unwrap();
        assert_eq!(
            response.digest,
            Some(Digest::new(HashAlgorithm::Sha256, expected))
        );
        assert_eq!(std::fs::read(&remote).unwrap(), data);
    }

    #[tokio::test]
    async fn upload_with_sha512_and_small_chunks() {
        let harness = Harness::start().await;
        let local = tempfile::tempdir().unwrap();
        let (source, data) = local_file(local.path(), 10_000);
        let remote = harness.remote("sha512.bin");

        let client = harness.client(ClientOptions {
            chunk_size: 1024,
            ..options(HashAlgorithm::Sha512)
        });
        let response = client
            .upload_file(&source, &remote.display().to_string())
            .await
            .unwrap();

        let digest = response.digest.unwrap();
        assert_eq!(digest.algorithm, HashAlgorithm::Sha512);
        assert_eq!(digest.data.len(), 64);
        assert_eq!(std::fs::read(&remote).unwrap(), data);
    }

    #[tokio::test]
    async fn upload_without_hash() {
        let harness = Harness::start().await;
        let local = tempfile::tempdir().unwrap();
        let (source, data) = local_file(local.path(), 4096);
        let remote = harness.remote("plain.bin");

        let response = harness
            .client(options(HashAlgorithm::Unspecified))
            .upload_file(&source, &remote.display().to_string())
            .await
            .unwrap();

        assert!(response.digest.is_none());
        assert_eq!(response.metadata.size, 4096);
        assert_eq!(std::fs::read(&remote).unwrap(), data);
    }

    #[tokio::test]
    async fn empty_file_upload() {
        let harness = Harness::start().await;
        let local = tempfile::tempdir().unwrap();
        let (source, _) = local_file(local.path(), 0);
        let remote = harness.remote("empty.bin");

        let response = harness
            .client(options(HashAlgorithm::Sha256))
            .upload_file(&source, &remote.display().to_string())
            .await
            .unwrap();

        assert_eq!(response.metadata.size, 0);
        let expected = digest_bytes(HashAlgorithm::Sha256, b"").unwrap();
        assert_eq!(response.digest.unwrap().data, expected);
    }

    #[tokio::test]
    async fn touch_truncates_existing_file() {
        let harness = Harness::start().await;
        let remote = harness.remote("touched");
        std::fs::write(&remote, b"old contents").unwrap();

        let response = harness
            .client(options(HashAlgorithm::Sha256))
            .touch(&remote.display().to_string())
            .await
            .unwrap();

        assert_eq!(response.metadata.size, 0);
        assert!(response.digest.is_none());
        assert_eq!(std::fs::metadata(&remote).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn relative_path_is_invalid_argument() {
        let harness = Harness::start().await;
        let local = tempfile::tempdir().unwrap();
        let (source, _) = local_file(local.path(), 2048);

        let err = harness
            .client(options(HashAlgorithm::Sha256))
            .upload_file(&source, "relative/out.bin")
            .await
            .unwrap_err();

        assert_eq!(err.side(), Side::Server);
        assert_eq!(err.status().map(|s| s.code), Some(Code::InvalidArgument));
    }

    #[tokio::test]
    async fn missing_parent_is_invalid_argument() {
        let harness = Harness::start().await;
        let remote = harness.remote("no/such/dir/file");

        let err = harness
            .client(options(HashAlgorithm::Sha256))
            .touch(&remote.display().to_string())
            .await
            .unwrap_err();

        assert_eq!(err.status().map(|s| s.code), Some(Code::InvalidArgument));
    }

    #[tokio::test]
    async fn missing_local_file_is_client_side() {
        let harness = Harness::start().await;
        let local = tempfile::tempdir().unwrap();
        let remote = harness.remote("never.bin");

        let err = harness
            .client(options(HashAlgorithm::Sha256))
            .upload_file(&local.path().join("absent"), &remote.display().to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Local { .. }), "{err}");
        assert_eq!(err.side(), Side::Client);
        assert!(err.to_string().ends_with("(client-side)"));
    }

    #[tokio::test]
    async fn cancelled_upload_reports_cancellation() {
        let harness = Harness::start().await;
        let local = tempfile::tempdir().unwrap();
        let (source, _) = local_file(local.path(), 8192);
        let remote = harness.remote("cancelled.bin");

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut call = harness.call().await;
        let err = send_file(
            &mut call,
            &source,
            &remote.display().to_string(),
            &options(HashAlgorithm::Sha256),
            &cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled), "{err}");
        assert_eq!(err.side(), Side::Client);
    }

    #[tokio::test]
    async fn corrupted_digest_is_data_loss() {
        let harness = Harness::start().await;
        let remote = harness.remote("corrupt.bin");
        let data = b"payload".to_vec();
        let mut wrong = digest_bytes(HashAlgorithm::Sha256, &data).unwrap();
        wrong[0] ^= 0xff;

        let mut call = harness.call().await;
        call.write(UploadRequest::Init(UploadInit {
            path: remote.display().to_string(),
            size: Some(data.len() as u64),
            hash_algorithm: Some(HashAlgorithm::Sha256),
        }))
        .await
        .unwrap();
        call.write(UploadRequest::Chunk(UploadChunk { offset: 0, data }))
            .await
            .unwrap();
        call.write(UploadRequest::Finish(UploadFinish {
            digest: Some(Digest::new(HashAlgorithm::Sha256, wrong)),
        }))
        .await
        .unwrap();
        call.writes_done().await.unwrap();

        let status = call.finish().await.unwrap_err();
        assert_eq!(status.code, Code::DataLoss);
    }

    #[tokio::test]
    async fn short_digest_is_invalid_argument() {
        let harness = Harness::start().await;
        let remote = harness.remote("short.bin");

        let mut call = harness.call().await;
        call.write(UploadRequest::Init(UploadInit {
            path: remote.display().to_string(),
            size: Some(3),
            hash_algorithm: Some(HashAlgorithm::Sha256),
        }))
        .await
        .unwrap();
        call.write(UploadRequest::Chunk(UploadChunk {
            offset: 0,
            data: b"abc".to_vec(),
        }))
        .await
        .unwrap();
        call.write(UploadRequest::Finish(UploadFinish {
            digest: Some(Digest::new(HashAlgorithm::Sha256, vec![0u8; 20])),
        }))
        .await
        .unwrap();
        call.writes_done().await.unwrap();

        let status = call.finish().await.unwrap_err();
        assert_eq!(status.code, Code::InvalidArgument);
    }

    #[tokio::test]
    async fn concurrent_uploads_to_distinct_paths() {
        let harness = Harness::start().await;
        let local = tempfile::tempdir().unwrap();
        let (source, data) = local_file(local.path(), 64 * 1024);

        let mut tasks = Vec::new();
        for i in 0..4 {
            let client = harness.client(options(HashAlgorithm::Sha256));
            let source = source.clone();
            let remote = harness.remote(&format!("parallel-{i}.bin"));
            tasks.push(tokio::spawn(async move {
                client
                    .upload_file(&source, &remote.display().to_string())
                    .await
                    .map(|_| remote)
            }));
        }

        for task in tasks {
            let remote = task.await.unwrap().unwrap();
            assert_eq!(std::fs::read(remote).unwrap(), data);
        }
    }
}
