//! Forward connector - the hop itself is the destination

use async_trait::async_trait;

use crate::common::{Address, Network, Result, Stream};

use super::Connector;

/// Forward connector - passthrough without any protocol handling
///
/// Used for hops that relay every byte to a fixed upstream, so there is
/// no request to send for the next address.
pub struct ForwardConnector;

#[async_trait]
impl Connector for ForwardConnector {
    async fn connect(&self, stream: Stream, _network: Network, _addr: &Address) -> Result<Stream> {
        Ok(stream)
    }

    fn name(&self) -> &'static str {
        "forward"
    }
}
