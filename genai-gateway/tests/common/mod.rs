use genai_gateway::config::{GatewayConfig, ModelConfig, ProviderKind, UploadConfig};
use genai_gateway::services::providers::mock::MockModel;
use genai_gateway::startup::Application;
use service_core::config::Config as CoreConfig;
use std::sync::Arc;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

pub struct TestApp {
    pub address: String,
    /// Scratch directory; removed when the app is dropped.
    pub upload_dir: TempDir,
    pub model: Arc<MockModel>,
    pub client: reqwest::Client,
}

pub fn test_config(upload_dir: &Path) -> GatewayConfig {
    GatewayConfig {
        common: CoreConfig { port: 0 }, // Random port for testing
        model: ModelConfig {
            provider: ProviderKind::Mock,
            api_key: String::new(),
            api_base: "http://127.0.0.1:9".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            vision_model: "gemini-2.0-flash".to_string(),
            request_timeout_secs: 5,
        },
        uploads: UploadConfig {
            dir: upload_dir.to_string_lossy().into_owned(),
            max_bytes: 64 * 1024,
        },
    }
}

impl TestApp {
    pub async fn spawn(model: MockModel) -> Self {
        Self::spawn_with(model, |_| {}).await
    }

    /// Spawn with the test config adjusted by `configure`.
    pub async fn spawn_with(model: MockModel, configure: impl FnOnce(&mut GatewayConfig)) -> Self {
        let upload_dir = tempfile::tempdir().expect("Failed to create upload directory");
        let mut config = test_config(upload_dir.path());
        configure(&mut config);
        let model = Arc::new(model);

        let app = Application::build_with_model(config, model.clone())
            .await
            .expect("Failed to build test application");
        let address = format!("http://127.0.0.1:{}", app.port());

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server by polling the health endpoint
        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            upload_dir,
            model,
            client,
        }
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_form(&self, path: &str, form: reqwest::multipart::Form) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Files currently sitting in the scratch directory.
    pub async fn upload_count(&self) -> usize {
        let mut entries = tokio::fs::read_dir(self.upload_dir.path())
            .await
            .expect("Upload directory missing");
        let mut count = 0;
        while entries.next_entry().await.unwrap().is_some() {
            count += 1;
        }
        count
    }
}

pub fn file_part(data: Vec<u8>, file_name: &str, mime: &str) -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(data)
        .file_name(file_name.to_string())
        .mime_str(mime)
        .unwrap()
}
