// ContainerInfo: the scraper image and how it is run.
// Describes the image tag, its build context and the bind mounts of the
// project directories.

use daily_common::{JobHostContext, WellKnownDirectory};
use std::path::PathBuf;

/// A host directory mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host_path: PathBuf,
    pub container_path: String,
}

impl BindMount {
    /// `<host>:<container>`, the value of a `-v` argument.
    pub fn to_volume_arg(&self) -> String {
        format!("{}:{}", self.host_path.display(), self.container_path)
    }
}

/// Information about the container a job runs.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    /// Image tag, used for both build and run.
    pub image: String,

    /// Directory holding the Dockerfile.
    pub build_context: PathBuf,

    pub mounts: Vec<BindMount>,

    /// Pass `--rm` so finished containers do not pile up.
    pub remove_on_exit: bool,
}

impl ContainerInfo {
    pub fn new(image: impl Into<String>, build_context: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            build_context: build_context.into(),
            mounts: Vec::new(),
            remove_on_exit: true,
        }
    }

    /// The scraper container: built from the base directory, with src, data,
    /// archive and log mounted under the container root.
    pub fn for_job(host_context: &JobHostContext) -> Self {
        let settings = host_context.settings();
        let root = settings.container_root.trim_end_matches('/');
        let mut info = Self::new(
            settings.image_tag(),
            host_context.directory(WellKnownDirectory::Base),
        );
        for directory in WellKnownDirectory::MOUNTED {
            info.mounts.push(BindMount {
                host_path: host_context.directory(directory),
                container_path: format!("{root}/{directory}"),
            });
        }
        info
    }

    /// Build the full list of `-v` volume mount arguments for `docker run`.
    pub fn build_volume_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for mount in &self.mounts {
            args.push("-v".to_string());
            args.push(mount.to_volume_arg());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{run_date_at, TestHost};
    use daily_common::JobSettings;
    use std::time::SystemTime;

    #[test]
    fn job_container_mounts_four_directories() {
        let host = TestHost::new();
        let info = ContainerInfo::for_job(&host.context);

        assert_eq!(info.image, "xkdc-daily");
        assert_eq!(info.build_context, host.base);
        assert!(info.remove_on_exit);

        let args = info.build_volume_args();
        let base = host.base.display();
        assert_eq!(
            args,
            vec![
                "-v".to_string(),
                format!("{base}/src:/app/src"),
                "-v".to_string(),
                format!("{base}/data:/app/data"),
                "-v".to_string(),
                format!("{base}/archive:/app/archive"),
                "-v".to_string(),
                format!("{base}/log:/app/log"),
            ]
        );
    }

    #[test]
    fn trailing_slash_on_container_root_is_ignored() {
        let settings = JobSettings {
            container_root: "/srv/".to_string(),
            image_tag: Some("scraper:dev".to_string()),
            ..JobSettings::default()
        };
        let host = TestHost::with(settings, run_date_at(SystemTime::now()));
        let info = ContainerInfo::for_job(&host.context);

        assert_eq!(info.image, "scraper:dev");
        assert_eq!(info.mounts[1].container_path, "/srv/data");
        assert_eq!(
            info.mounts[1].to_volume_arg(),
            format!("{}:/srv/data", host.base.join("data").display())
        );
    }
}
