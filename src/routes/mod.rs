pub mod dehaze;

use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new().merge(dehaze::routes())
}

/// The complete application with its shared state attached.
pub fn app(state: Arc<AppState>, max_upload_size: usize) -> Router {
    build_routes()
        .layer(DefaultBodyLimit::max(max_upload_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncoderSettings;
    use crate::dehaze::tests::tiny_dehazer;
    use crate::pipeline::FramePipeline;
    use crate::video::testing::make_clip;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    const BOUNDARY: &str = "ffa-serve-test-boundary";

    fn limited_app(max_upload_size: usize) -> Router {
        let pipeline = FramePipeline::new(Arc::new(tiny_dehazer()), EncoderSettings::default());
        app(Arc::new(AppState::new(pipeline)), max_upload_size)
    }

    fn test_app() -> Router {
        limited_app(16 * 1024 * 1024)
    }

    /// One form part: field name, optional filename, contents.
    type Part<'a> = (&'a str, Option<&'a str>, &'a [u8]);

    fn multipart_request(field: &str, filename: Option<&str>, data: &[u8]) -> Request<Body> {
        multipart_form(&[(field, filename, data)])
    }

    fn multipart_form(parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for (field, filename, data) in parts {
            let disposition = match filename {
                Some(f) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, f),
                None => format!("form-data; name=\"{}\"", field),
            };
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
            body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/dehaze-video")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_error(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn missing_file_field_is_bad_request() {
        let response = test_app()
            .oneshot(multipart_request("notes", None, b"hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_error(response).await.contains("video"));
    }

    #[tokio::test]
    async fn empty_video_is_unprocessable() {
        let response = test_app()
            .oneshot(multipart_request("video", Some("clip.mp4"), b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json_error(response).await.starts_with("unable to decode video"));
    }

    #[tokio::test]
    async fn named_video_field_wins_over_earlier_file_fields() {
        // The earlier file field is not empty, so picking it would reach the decoder
        let response = test_app()
            .oneshot(multipart_form(&[
                ("thumb", Some("t.png"), &b"not the upload"[..]),
                ("video", Some("v.mp4"), &b""[..]),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_error(response).await, "unable to decode video: empty upload");
    }

    #[tokio::test]
    async fn first_file_field_is_the_fallback() {
        let response = test_app()
            .oneshot(multipart_form(&[
                ("notes", None, &b"hello"[..]),
                ("upload", Some("a.mp4"), &b""[..]),
                ("extra", Some("b.mp4"), &b"second file"[..]),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_error(response).await, "unable to decode video: empty upload");
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let response = limited_app(1024)
            .oneshot(multipart_request("video", Some("clip.mp4"), &[0u8; 4096]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn other_routes_are_not_served() {
        let response = test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn corrupt_video_is_unprocessable() {
        let response = test_app()
            .oneshot(multipart_request(
                "video",
                Some("clip.mp4"),
                b"garbage bytes, not a container",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json_error(response).await.starts_with("unable to decode video"));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn returns_video_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        make_clip(&path, 16, 16, 5, 2);
        let data = std::fs::read(&path).unwrap();

        // any file field is accepted when none is named "video"
        let response = test_app()
            .oneshot(multipart_request("upload", Some("clip.mp4"), &data))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"dehazed_video.mp4\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!body.is_empty());
    }
}
