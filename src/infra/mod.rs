//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod mock;
pub mod remote;
pub mod telemetry;

use std::sync::Arc;

use tracing::info;

use crate::application::repos::ContentSource;
use crate::config::SourceSettings;

use self::error::InfraError;
use self::mock::MockSource;
use self::remote::RemoteSource;

/// Construct the content source selected in settings.
pub async fn build_source(settings: &SourceSettings) -> Result<Arc<dyn ContentSource>, InfraError> {
    match settings {
        SourceSettings::Mock { fixtures_path } => {
            let source = match fixtures_path {
                Some(path) => MockSource::load(path).await?,
                None => MockSource::bundled()?,
            };
            info!(source = "mock", "content source ready");
            Ok(Arc::new(source))
        }
        SourceSettings::Remote(remote) => {
            let source = RemoteSource::new(remote)?;
            info!(source = "remote", base_url = %remote.base_url, "content source ready");
            Ok(Arc::new(source))
        }
    }
}
