//! Runway video generation
//!
//! Image-to-video tasks are created with `POST /v1/image_to_video`, polled
//! with `GET /v1/tasks/{id}` and cancelled with `DELETE /v1/tasks/{id}`.
//! Text-to-video runs as two tasks: `POST /v1/text_to_image` renders a first
//! frame, which then seeds an image-to-video task. Upscaling is one
//! `POST /v1/video_upscale` task polled the same way.

mod client;
pub mod converter;
pub mod types;

pub use client::{RunwayClient, API_VERSION, DEFAULT_BASE_URL};
pub use types::{RunwayPayload, RunwayRequest, RunwayTask};
