pub mod cancel;
pub mod event;
pub mod gesture;
pub mod poller;
pub mod reply;
pub mod ring;
pub mod subscription;
pub mod telemetry;
