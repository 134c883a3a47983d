mod helpers;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sourcefetch_getter::{
    Address, CancellationToken, Client, DetectRequest, FetchConfig, FetchError, FetchResult,
    FileGetter, Getter, GetterRegistry, Mode, Request,
};

/// Claims every source and counts how often it was asked.
#[derive(Default)]
struct RecordingGetter {
    detect_calls: AtomicUsize,
}

#[async_trait]
impl Getter for RecordingGetter {
    fn scheme(&self) -> &'static str {
        "rec"
    }

    fn detect(&self, req: &DetectRequest<'_>) -> FetchResult<Option<Address>> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        let url = url::Url::parse(&format!("rec://claimed/{}", req.src.trim_start_matches('/')))
            .map_err(|e| FetchError::invalid_address(req.src, e.to_string()))?;
        Ok(Some(Address::new(url)))
    }

    async fn mode(&self, _address: &Address, _cancel: &CancellationToken) -> FetchResult<Mode> {
        Ok(Mode::File)
    }

    async fn get(&self, _req: &mut Request) -> FetchResult<()> {
        Ok(())
    }

    async fn get_file(&self, _req: &mut Request) -> FetchResult<()> {
        Ok(())
    }
}

fn recording_client() -> (Client, Arc<RecordingGetter>) {
    let recorder = Arc::new(RecordingGetter::default());
    let mut registry = GetterRegistry::new();
    registry.register(recorder.clone()).unwrap();
    registry.register(Arc::new(FileGetter::new(1024))).unwrap();
    (Client::new(registry), recorder)
}

#[cfg(unix)]
#[test]
fn relative_paths_resolve_against_pwd() {
    helpers::init_test_tracing();
    let client = Client::default();

    let address = client
        .detect("./modules/foo", Some(Path::new("/work")), None)
        .unwrap()
        .unwrap();
    assert_eq!(address.to_string(), "file:///work/modules/foo");
    assert_eq!(address.getter(), "file");
}

#[cfg(unix)]
#[tokio::test]
async fn detected_directory_reports_directory_mode() {
    helpers::init_test_tracing();
    let tmp = tempfile::tempdir().unwrap();
    helpers::fixtures::module_tree(tmp.path());
    let client = Client::default();

    let address = client
        .detect("./module", Some(tmp.path()), None)
        .unwrap()
        .unwrap();
    let mode = client
        .mode(&address, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(mode, Mode::Directory);

    let file = client
        .detect("module/main.tf", Some(tmp.path()), None)
        .unwrap()
        .unwrap();
    let mode = client.mode(&file, &CancellationToken::new()).await.unwrap();
    assert_eq!(mode, Mode::File);
}

#[test]
fn detection_is_idempotent() {
    let client = Client::default();
    let pwd = Path::new("/work");

    let mut sources = vec!["file:///work/modules/foo"];
    #[cfg(unix)]
    sources.push("./modules/foo");
    #[cfg(feature = "getter-s3")]
    sources.extend([
        "s3://bucket/key",
        "bucket.s3.us-west-2.amazonaws.com/key/obj.txt",
        "s3-eu-west-1.amazonaws.com/bucket/dir",
    ]);
    #[cfg(feature = "getter-hg")]
    sources.extend(["hg.sr.ht/~alice/project?rev=tip", "hg::https://example.com/repo"]);

    for src in sources {
        let first = client.detect(src, Some(pwd), None).unwrap().unwrap();
        let second = client
            .detect(&first.to_string(), Some(pwd), None)
            .unwrap()
            .unwrap();
        assert_eq!(first, second, "detecting {} twice changed it", src);
    }
}

#[cfg(feature = "getter-s3")]
#[test]
fn amazon_virtual_hosted_source_becomes_path_style() {
    let client = Client::default();
    let address = client
        .detect("bucket.s3.us-west-2.amazonaws.com/key/obj.txt", None, None)
        .unwrap()
        .unwrap();
    assert_eq!(
        address.to_string(),
        "s3::https://s3.us-west-2.amazonaws.com/bucket/key/obj.txt"
    );
    assert_eq!(address.getter(), "s3");
}

#[cfg(unix)]
#[test]
fn forced_getter_excludes_every_other_getter() {
    let (client, recorder) = recording_client();

    let address = client.detect("/srv/data", None, Some("file")).unwrap().unwrap();
    assert_eq!(address.getter(), "file");
    assert_eq!(recorder.detect_calls.load(Ordering::SeqCst), 0);

    let address = client.detect("file::/srv/data", None, None).unwrap().unwrap();
    assert_eq!(address.getter(), "file");
    assert_eq!(recorder.detect_calls.load(Ordering::SeqCst), 0);

    // Unforced, the first registered getter wins.
    let address = client.detect("/srv/data", None, None).unwrap().unwrap();
    assert_eq!(address.getter(), "rec");
    assert_eq!(recorder.detect_calls.load(Ordering::SeqCst), 1);
}

#[cfg(unix)]
#[test]
fn forced_argument_must_agree_with_prefix() {
    let (client, _) = recording_client();
    let err = client
        .detect("rec::https://example.com/x", None, Some("file"))
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidAddress { .. }));

    assert!(client
        .detect("FILE::/srv/data", None, Some("file"))
        .unwrap()
        .is_some());
}

#[test]
fn unknown_forced_getter_is_unsupported() {
    let client = Client::default();
    let err = client
        .detect("ftp::https://example.com/x", None, None)
        .unwrap_err();
    assert!(matches!(err, FetchError::UnsupportedGetter(ref s) if s == "ftp"));
}

#[test]
fn empty_source_is_not_a_candidate() {
    let client = Client::default();
    assert!(client.detect("", None, None).unwrap().is_none());
}

#[test]
fn relative_path_without_pwd_is_rejected() {
    let client = Client::default();
    let err = client.detect("modules/foo", None, None).unwrap_err();
    assert!(matches!(err, FetchError::MissingPwd(_)));
}

#[cfg(feature = "getter-s3")]
#[test]
fn unclaimed_sources_are_reported() {
    let mut registry = GetterRegistry::new();
    registry
        .register(Arc::new(
            sourcefetch_getter::S3Getter::new(&FetchConfig::default()),
        ))
        .unwrap();
    let client = Client::new(registry);

    let err = client
        .detect("relative/path", Some(Path::new("/work")), None)
        .unwrap_err();
    assert!(matches!(err, FetchError::InvalidAddress { .. }));
}

#[test]
fn urls_with_unregistered_schemes_are_not_local_paths() {
    let client = Client::default();

    for src in ["https://example.com/x", "ftp://example.com/x"] {
        let err = client
            .detect(src, Some(Path::new("/work")), None)
            .unwrap_err();
        assert!(
            matches!(err, FetchError::InvalidAddress { .. }),
            "{} resolved to {:?}",
            src,
            err
        );

        let err = client.detect(src, None, None).unwrap_err();
        assert!(matches!(err, FetchError::InvalidAddress { .. }));
    }
}

#[cfg(all(unix, feature = "getter-s3"))]
#[test]
fn forced_getter_falls_back_to_local_path() {
    let client = Client::default();
    let address = client
        .detect("s3::./bucket/key", Some(Path::new("/work")), None)
        .unwrap()
        .unwrap();
    assert_eq!(address.to_string(), "s3::file:///work/bucket/key");
}
