mod sse;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use reqwest::Response;

pub use sse::Sse;

/// The body of a streaming response, as it arrives.
pub type Body = BoxStream<'static, Result<Bytes, reqwest::Error>>;

pub fn body_from_response(resp: Response) -> Body {
    stream::unfold(resp, |mut resp| async move {
        let chunk = resp.chunk().await.transpose()?;
        Some((chunk, resp))
    })
    .boxed()
}

/// Replays canned chunks as a response body.
#[cfg(test)]
pub fn body_from_chunks<I>(chunks: I) -> Body
where
    I: IntoIterator<Item = &'static [u8]>,
{
    let chunks: Vec<_> = chunks
        .into_iter()
        .map(|chunk| Ok(Bytes::from_static(chunk)))
        .collect();
    stream::iter(chunks).boxed()
}
