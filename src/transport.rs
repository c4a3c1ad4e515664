use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use gateway_api::{ByteStream, CancellationSignal, ChatStreamRequest, GatewayClient, GatewayError};

/// Opens the response body for one chat request.
///
/// The seam the runtime drives; tests swap in scripted bodies.
pub trait StreamTransport: Send + Sync {
    fn open(
        &self,
        request: ChatStreamRequest,
        cancel: CancellationSignal,
    ) -> BoxFuture<'static, Result<ByteStream, GatewayError>>;
}

impl StreamTransport for GatewayClient {
    fn open(
        &self,
        request: ChatStreamRequest,
        cancel: CancellationSignal,
    ) -> BoxFuture<'static, Result<ByteStream, GatewayError>> {
        let client = self.clone();
        async move { client.open_stream(&request, Some(&cancel)).await }.boxed()
    }
}
