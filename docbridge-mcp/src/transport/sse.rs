//! Server-Sent Events rendering of a channel's push stream

use axum::response::{
    sse::{Event, KeepAlive, Sse},
    IntoResponse, Response,
};
use std::{convert::Infallible, time::Duration};
use tracing::{debug, warn};

use crate::session::PushStream;

/// SSE event name used for pushed JSON-RPC messages
pub const MESSAGE_EVENT: &str = "message";

/// Turn an attached push stream into a `text/event-stream` response.
///
/// The response ends when the channel closes; dropping it (client went away)
/// detaches the stream from the channel.
pub fn push_stream_response(mut push: PushStream, keep_alive: Duration) -> Response {
    let events = async_stream::stream! {
        while let Some(notification) = push.next().await {
            match Event::default().event(MESSAGE_EVENT).json_data(&notification) {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => warn!("Dropping push message that failed to encode: {}", e),
            }
        }
        debug!("Push stream ended");
    };

    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(keep_alive))
        .into_response()
}
