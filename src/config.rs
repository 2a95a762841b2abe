//! ゲートウェイの設定。
use serde_yaml;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::epoch::{Epoch, EpochOracle, RetryPolicy};
use crate::oid::{OidRange, ReadOnlyRanges};
use crate::{Error, ErrorKind, Result};

/// `Gateway` の設定。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// リクエストが複製数を指定しない場合に使われる複製数。
    #[serde(default = "default_copies")]
    pub default_copies: u8,

    /// 複製数の上限。
    #[serde(default = "default_max_copies")]
    pub max_copies: usize,

    /// クラスタを構成するノード数の上限。
    ///
    /// 一つの転送セッションが保持するエントリ数もこの値を超えない。
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Retry budget of the forward wait loop and of the transport primitives.
    ///
    /// Retries only happen while the request's epoch is still current.
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: usize,

    /// 転送先の応答を待つ際のタイムアウト時間。
    #[serde(
        rename = "poll_timeout_millis",
        default = "default_poll_timeout",
        with = "crate::serde_ext::duration_millis"
    )]
    pub poll_timeout: Duration,

    /// オブジェクトキャッシュを使うかどうか。
    #[serde(default)]
    pub enable_object_cache: bool,

    /// 書き込みが禁止されているオブジェクトIDの範囲。
    #[serde(default)]
    pub readonly_ranges: Vec<OidRange>,
}
impl GatewayConfig {
    /// Loads a configuration from the given YAML file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = track!(File::open(path.as_ref()).map_err(Error::from))?;
        let config: GatewayConfig = track!(serde_yaml::from_reader(file).map_err(Error::from))?;
        track!(config.validate())?;
        Ok(config)
    }

    /// Checks the consistency of the configuration values.
    pub fn validate(&self) -> Result<()> {
        track_assert!(
            self.default_copies > 0,
            ErrorKind::InvalidInput,
            "default_copies must be positive"
        );
        track_assert!(
            usize::from(self.default_copies) <= self.max_copies,
            ErrorKind::InvalidInput,
            "default_copies={} exceeds max_copies={}",
            self.default_copies,
            self.max_copies
        );
        track_assert!(
            self.max_copies <= self.max_nodes,
            ErrorKind::InvalidInput,
            "max_copies={} exceeds max_nodes={}",
            self.max_copies,
            self.max_nodes
        );
        track_assert_ne!(
            self.poll_timeout,
            Duration::from_millis(0),
            ErrorKind::InvalidInput
        );
        Ok(())
    }

    /// Returns the reserved read-only ranges.
    pub fn readonly_ranges(&self) -> ReadOnlyRanges {
        ReadOnlyRanges::new(self.readonly_ranges.clone())
    }

    /// Makes the retry policy applied to a request issued at `epoch`.
    pub fn retry_policy(&self, epoch: Epoch, oracle: Arc<dyn EpochOracle>) -> RetryPolicy {
        RetryPolicy::new(epoch, self.max_retry_count, oracle)
    }
}
impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_copies: default_copies(),
            max_copies: default_max_copies(),
            max_nodes: default_max_nodes(),
            max_retry_count: default_max_retry_count(),
            poll_timeout: default_poll_timeout(),
            enable_object_cache: false,
            readonly_ranges: Vec::new(),
        }
    }
}

fn default_copies() -> u8 {
    3
}

fn default_max_copies() -> usize {
    31
}

fn default_max_nodes() -> usize {
    6144
}

fn default_max_retry_count() -> usize {
    20
}

fn default_poll_timeout() -> Duration {
    Duration::from_millis(5000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use trackable::result::TestResult;

    #[test]
    fn default_config_is_valid() -> TestResult {
        let config = GatewayConfig::default();
        track!(config.validate())?;
        assert_eq!(config.default_copies, 3);
        assert_eq!(config.poll_timeout, Duration::from_secs(5));
        Ok(())
    }

    #[test]
    fn deserialize_fills_defaults() -> TestResult {
        let yaml = r#"---
poll_timeout_millis: 250
enable_object_cache: true
readonly_ranges:
  - start: 16
    end: 32
"#;
        let config: GatewayConfig = track!(serde_yaml::from_str(yaml).map_err(Error::from))?;
        assert_eq!(config.poll_timeout, Duration::from_millis(250));
        assert!(config.enable_object_cache);
        assert_eq!(config.max_copies, 31);
        assert_eq!(config.max_retry_count, 20);
        assert!(config.readonly_ranges().is_readonly(crate::ObjectId::new(16)));
        Ok(())
    }

    #[test]
    fn validate_rejects_inconsistent_values() {
        let mut config = GatewayConfig::default();
        config.default_copies = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.max_copies = 2;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.max_nodes = 4;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.poll_timeout = Duration::from_millis(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_yaml_file_works() -> TestResult {
        let path = std::env::temp_dir().join(format!(
            "flockgate-config-test-{}.yml",
            std::process::id()
        ));
        {
            let mut f = track!(File::create(&path).map_err(Error::from))?;
            track!(f
                .write_all(b"default_copies: 2\nmax_retry_count: 3\n")
                .map_err(Error::from))?;
        }
        let result = GatewayConfig::from_yaml_file(&path);
        let _ = fs::remove_file(&path);

        let config = track!(result)?;
        assert_eq!(config.default_copies, 2);
        assert_eq!(config.max_retry_count, 3);
        Ok(())
    }
}
