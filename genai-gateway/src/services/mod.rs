pub mod encoder;
pub mod generation;
pub mod metrics;
pub mod providers;
pub mod upload;

pub use generation::Generator;
pub use metrics::{get_metrics, init_metrics};
pub use upload::{MediaForm, Upload, UploadReceiver};
