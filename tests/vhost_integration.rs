//! Integration tests for virtual host creation and removal.
//!
//! A temporary file stands in for the system hosts file.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;

use devnest::error::{DevNestError, DevNestResult, ProcessErrorKind, ValidationErrorKind};
use devnest::fsio::RetryPolicy;
use devnest::paths::PathConfig;
use devnest::settings::SettingsManager;
use devnest::vhost::{vhost_path, Elevation, HostsFile, VirtualHostManager, HOSTS_TAG};

/// Records what it was asked to install, optionally failing.
#[derive(Default)]
struct FakeElevation {
    fail: bool,
    installed: Mutex<Vec<String>>,
}

impl Elevation for FakeElevation {
    fn replace_file(&self, source: &Path, _dest: &Path) -> DevNestResult<()> {
        if self.fail {
            return Err(DevNestError::Process {
                kind: ProcessErrorKind::ExecutionFailed {
                    message: "prompt dismissed".to_string(),
                },
            });
        }
        let content = std::fs::read_to_string(source)?;
        self.installed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(content);
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    settings: Arc<SettingsManager>,
    hosts: PathBuf,
}

impl Fixture {
    async fn new(hosts_content: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let settings = Arc::new(SettingsManager::new(
            PathConfig::native(dir.path().join("stack")),
            Duration::from_millis(20),
            RetryPolicy::new(2, Duration::from_millis(1)),
        ));
        settings.load(false).await;

        let hosts = dir.path().join("hosts");
        std::fs::write(&hosts, hosts_content).expect("Failed to write hosts file");
        Self {
            _dir: dir,
            settings,
            hosts,
        }
    }

    fn vhosts(&self, elevation: Arc<dyn Elevation>) -> VirtualHostManager {
        VirtualHostManager::with_hosts(
            Arc::clone(&self.settings),
            HostsFile::with_path(self.hosts.clone()),
            elevation,
        )
    }

    fn hosts_text(&self) -> String {
        std::fs::read_to_string(&self.hosts).unwrap()
    }

    fn site_dir(&self, site: &str) -> PathBuf {
        self.settings.paths().www().join(site)
    }

    fn add_site(&self, site: &str) {
        std::fs::create_dir_all(self.site_dir(site)).expect("Failed to create site dir");
    }
}

fn count_lines(text: &str, needle: &str) -> usize {
    text.lines().filter(|line| line.contains(needle)).count()
}

#[tokio::test]
async fn test_create_is_idempotent() {
    let fixture = Fixture::new("127.0.0.1\tlocalhost\n").await;
    fixture.add_site("blog");
    let vhosts = fixture.vhosts(Arc::new(FakeElevation::default()));

    vhosts.create_virtual_host("blog").await.unwrap();
    vhosts.create_virtual_host("blog").await.unwrap();

    let conf = vhost_path(&fixture.settings.paths(), "blog");
    assert!(conf.exists());
    let rendered = std::fs::read_to_string(&conf).unwrap();
    assert!(rendered.contains("blog.dev"));

    let conf_dir = conf.parent().unwrap();
    assert_eq!(std::fs::read_dir(conf_dir).unwrap().count(), 1);

    let hosts = fixture.hosts_text();
    assert_eq!(count_lines(&hosts, "blog.dev"), 1);
    assert!(hosts.contains(&format!("127.0.0.1\tblog.dev\t{}", HOSTS_TAG)));
    assert!(hosts.starts_with("127.0.0.1\tlocalhost\n"));
}

#[tokio::test]
async fn test_existing_vhost_file_is_not_rewritten() {
    let fixture = Fixture::new("").await;
    fixture.add_site("shop");
    let vhosts = fixture.vhosts(Arc::new(FakeElevation::default()));

    let conf = vhost_path(&fixture.settings.paths(), "shop");
    std::fs::create_dir_all(conf.parent().unwrap()).unwrap();
    std::fs::write(&conf, "# hand edited\n").unwrap();

    vhosts.create_virtual_host("shop").await.unwrap();
    assert_eq!(std::fs::read_to_string(&conf).unwrap(), "# hand edited\n");
    assert_eq!(count_lines(&fixture.hosts_text(), "shop.dev"), 1);
}

#[tokio::test]
async fn test_remove_deletes_file_and_hosts_lines() {
    let fixture = Fixture::new(
        "127.0.0.1\tlocalhost\n127.0.0.1\tmyblog.dev\n127.0.0.1\tblog.dev\n",
    )
    .await;
    fixture.add_site("blog");
    let vhosts = fixture.vhosts(Arc::new(FakeElevation::default()));

    vhosts.create_virtual_host("blog").await.unwrap();
    std::fs::remove_dir(fixture.site_dir("blog")).unwrap();
    vhosts.remove_virtual_host("blog").await.unwrap();

    assert!(!vhost_path(&fixture.settings.paths(), "blog").exists());
    let hosts = fixture.hosts_text();
    assert_eq!(count_lines(&hosts, "\tblog.dev"), 0);
    assert_eq!(count_lines(&hosts, "myblog.dev"), 1);
    assert!(hosts.contains("localhost"));

    // Removing again is harmless.
    vhosts.remove_virtual_host("blog").await.unwrap();
}

#[tokio::test]
async fn test_invalid_site_name_touches_nothing() {
    let fixture = Fixture::new("127.0.0.1\tlocalhost\n").await;
    let vhosts = fixture.vhosts(Arc::new(FakeElevation::default()));

    assert!(vhosts.create_virtual_host("../etc").await.is_err());
    assert!(vhosts.create_virtual_host("").await.is_err());
    assert_eq!(fixture.hosts_text(), "127.0.0.1\tlocalhost\n");
}

#[tokio::test]
async fn test_create_requires_site_directory() {
    let fixture = Fixture::new("127.0.0.1\tlocalhost\n").await;
    let vhosts = fixture.vhosts(Arc::new(FakeElevation::default()));

    let err = vhosts.create_virtual_host("ghost").await.unwrap_err();
    assert!(matches!(
        err,
        DevNestError::Validation {
            kind: ValidationErrorKind::UnknownSite { ref name, .. }
        } if name == "ghost"
    ));
    assert!(!vhost_path(&fixture.settings.paths(), "ghost").exists());
    assert_eq!(fixture.hosts_text(), "127.0.0.1\tlocalhost\n");
}

#[tokio::test]
async fn test_regenerate_all_covers_every_site() {
    let fixture = Fixture::new("").await;
    for site in ["alpha", "beta", "bad name"] {
        fixture.add_site(site);
    }
    let vhosts = fixture.vhosts(Arc::new(FakeElevation::default()));

    assert_eq!(vhosts.regenerate_all().await.unwrap(), 2);

    let paths = fixture.settings.paths();
    assert!(vhost_path(&paths, "alpha").exists());
    assert!(vhost_path(&paths, "beta").exists());
    let hosts = fixture.hosts_text();
    assert_eq!(count_lines(&hosts, "alpha.dev"), 1);
    assert_eq!(count_lines(&hosts, "beta.dev"), 1);
}

#[cfg(unix)]
mod privileged {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    use nix::unistd::geteuid;

    /// Make the hosts file read-only. Returns false when running as root,
    /// where permissions would not stop the write.
    fn lock_hosts(path: &Path) -> bool {
        if geteuid().is_root() {
            return false;
        }
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o444)).unwrap();
        true
    }

    #[tokio::test]
    async fn test_readonly_hosts_uses_elevation() {
        let fixture = Fixture::new("127.0.0.1\tlocalhost\n").await;
        fixture.add_site("blog");
        if !lock_hosts(&fixture.hosts) {
            return;
        }
        let elevation = Arc::new(FakeElevation::default());
        let vhosts = fixture.vhosts(elevation.clone());

        vhosts.create_virtual_host("blog").await.unwrap();

        let installed = elevation.installed.lock().unwrap();
        assert_eq!(installed.len(), 1);
        assert!(installed[0].contains("127.0.0.1\tblog.dev\t#DevNest"));
        assert!(installed[0].starts_with("127.0.0.1\tlocalhost\n"));
    }

    #[tokio::test]
    async fn test_declined_elevation_reports_manual_line() {
        let fixture = Fixture::new("").await;
        fixture.add_site("blog");
        if !lock_hosts(&fixture.hosts) {
            return;
        }
        let vhosts = fixture.vhosts(Arc::new(FakeElevation {
            fail: true,
            ..FakeElevation::default()
        }));

        let err = vhosts.create_virtual_host("blog").await.unwrap_err();
        match &err {
            DevNestError::PrivilegeRequired { action, entry } => {
                assert_eq!(*action, "Add");
                assert_eq!(entry, "127.0.0.1\tblog.dev\t#DevNest");
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().contains("Add this line manually"));
        // The vhost file itself was written before the hosts step failed.
        assert!(vhost_path(&fixture.settings.paths(), "blog").exists());
    }
}
