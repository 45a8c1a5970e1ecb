// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP routes.

pub mod health;
pub mod jobs;

use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

/// Room for multipart framing on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// All API routes bound to `state`. Transport layers are added by the caller.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size_bytes() + MULTIPART_OVERHEAD;
    Router::new()
        .route("/", get(health::info))
        .route("/api/v1/health", get(health::check))
        .route("/api/v1/upload", post(jobs::upload))
        .route("/api/v1/generate", post(jobs::generate))
        .route("/api/v1/status/:job_id", get(jobs::status))
        .route("/api/v1/download/:job_id/:format", get(jobs::download))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{GenerateResponse, JobStatus, StatusResponse, UploadResponse};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use image::{ImageFormat, Rgb, RgbImage};
    use scenelift_vision::PipelineConfig;
    use serde::de::DeserializeOwned;
    use std::io::Cursor;
    use std::path::PathBuf;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "scenelift-test-boundary";

    struct TestApp {
        router: Router,
        root: PathBuf,
    }

    impl Drop for TestApp {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    impl TestApp {
        async fn new() -> Self {
            let root = std::env::temp_dir().join(format!("scenelift-server-{}", Uuid::new_v4()));
            let config = Config {
                port: 0,
                storage_dir: root.to_string_lossy().into_owned(),
                max_file_size_mb: 1,
                request_timeout_secs: 30,
                worker_threads: 2,
                max_concurrent_jobs: 1,
                job_retention_hours: 24,
                cleanup_interval_secs: 3600,
                depth_preset: "quality".into(),
                cors_origins: vec!["*".into()],
            };
            let state = AppState::new(config, PipelineConfig::default()).await.unwrap();
            Self {
                router: router(state),
                root,
            }
        }

        async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }

        async fn get(&self, uri: &str) -> Response {
            self.send(Request::get(uri).body(Body::empty()).unwrap()).await
        }

        async fn upload(&self, field: &str, filename: &str, data: &[u8]) -> Response {
            let mut body = format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .into_bytes();
            body.extend_from_slice(data);
            body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
            let request = Request::post("/api/v1/upload")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap();
            self.send(request).await
        }

        async fn generate(&self, body: serde_json::Value) -> Response {
            let request = Request::post("/api/v1/generate")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            self.send(request).await
        }

        /// Poll until the job leaves `processing`.
        async fn wait(&self, job_id: Uuid) -> StatusResponse {
            for _ in 0..600 {
                let status: StatusResponse =
                    json(self.get(&format!("/api/v1/status/{job_id}")).await).await;
                if !matches!(status.status, JobStatus::Processing) {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            panic!("job {job_id} did not finish");
        }
    }

    async fn bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn json<T: DeserializeOwned>(response: Response) -> T {
        serde_json::from_slice(&bytes(response).await).unwrap()
    }

    fn room_png() -> Vec<u8> {
        let image = RgbImage::from_fn(64, 48, |x, y| {
            if y > 30 {
                Rgb([120 + (x % 7) as u8 * 10, 90, 60])
            } else {
                Rgb([200, 190, (150 + y) as u8])
            }
        });
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_info_and_health() {
        let app = TestApp::new().await;
        let response = app.get("/").await;
        assert_eq!(response.status(), StatusCode::OK);
        let info: serde_json::Value = json(response).await;
        assert_eq!(info["service"], "scenelift-server");

        let health: serde_json::Value = json(app.get("/api/v1/health").await).await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["jobs"], 0);
    }

    #[tokio::test]
    async fn test_upload_validation() {
        let app = TestApp::new().await;

        let response = app.upload("file", "room.png", &room_png()).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.upload("image", "notes.txt", b"hello").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = json(response).await;
        assert_eq!(body["code"], "INVALID_FILE_TYPE");

        let response = app.upload("image", "huge.png", &vec![0u8; 3 * 1024 * 1024]).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_generation_flow() {
        let app = TestApp::new().await;

        let response = app.upload("image", "Living Room.PNG", &room_png()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let uploaded: UploadResponse = json(response).await;
        assert!(uploaded.success);
        let id = uploaded.job_id;

        let status: StatusResponse = json(app.get(&format!("/api/v1/status/{id}")).await).await;
        assert_eq!(status.status, JobStatus::Uploaded);
        assert_eq!(status.progress, 0);

        // Nothing to download yet
        let response = app.get(&format!("/api/v1/download/{id}/glb")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .generate(serde_json::json!({ "job_id": id, "room_complexity": "low" }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let started: GenerateResponse = json(response).await;
        assert_eq!(started.status, JobStatus::Processing);

        let response = app.generate(serde_json::json!({ "job_id": id })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let done = app.wait(id).await;
        assert_eq!(done.status, JobStatus::Completed, "error: {:?}", done.error);
        assert_eq!(done.progress, 100);
        assert!(done.completed_at.is_some());
        let files = done.output_files.unwrap();
        assert!(files.contains_key("glb"));
        assert!(files.contains_key("obj"));

        let response = app.get(&format!("/api/v1/download/{id}/glb")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "model/gltf-binary"
        );
        assert_eq!(&bytes(response).await[..4], b"glTF");

        let response = app.get(&format!("/api/v1/download/{id}/fbx")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("generated_3d_environment.obj"));
        let obj = String::from_utf8(bytes(response).await).unwrap();
        assert!(obj.lines().any(|line| line.starts_with("v ")));

        let response = app.get(&format!("/api/v1/download/{id}/stl")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_undecodable_upload_fails_the_job() {
        let app = TestApp::new().await;
        let uploaded: UploadResponse = json(app.upload("image", "broken.png", b"not a png").await).await;

        let response = app
            .generate(serde_json::json!({ "job_id": uploaded.job_id }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let done = app.wait(uploaded.job_id).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.unwrap().stage, "load");
        assert!(done.output_files.is_none());
    }

    #[tokio::test]
    async fn test_unknown_jobs_and_bad_requests() {
        let app = TestApp::new().await;

        let response = app.get(&format!("/api/v1/status/{}", Uuid::new_v4())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.get("/api/v1/status/not-a-job").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.generate(serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .generate(serde_json::json!({ "job_id": Uuid::new_v4() }))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .generate(serde_json::json!({ "job_id": "x", "room_complexity": "enormous" }))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
