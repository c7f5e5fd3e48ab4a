/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Data and control stream pairs.

use crate::subscription::Subscription;
use crate::transport::{
    FragmentHandler, FragmentSource, Publication, ReplicationTransport, StreamChannel,
};
use fixgate_core::error::TransportError;
use std::sync::Arc;
use tracing::info;

/// One publication and one subscription for each of the data and control
/// channels.
///
/// Publications are shared handles; each subscription source can be bound to
/// a handler exactly once.
#[derive(Debug)]
pub struct ReplicationStreams {
    data_publication: Arc<dyn Publication>,
    control_publication: Arc<dyn Publication>,
    data_source: Option<Box<dyn FragmentSource>>,
    control_source: Option<Box<dyn FragmentSource>>,
}

impl ReplicationStreams {
    /// Opens both channels on `transport`.
    ///
    /// # Errors
    /// Returns the transport error if any publication or subscription fails
    /// to open.
    pub fn open(transport: &dyn ReplicationTransport) -> Result<Self, TransportError> {
        let streams = Self {
            data_publication: transport.open_publication(StreamChannel::Data)?,
            control_publication: transport.open_publication(StreamChannel::Control)?,
            data_source: Some(transport.open_subscription(StreamChannel::Data)?),
            control_source: Some(transport.open_subscription(StreamChannel::Control)?),
        };
        info!("replication streams open");
        Ok(streams)
    }

    /// Returns the data publication.
    #[must_use]
    pub fn data_publication(&self) -> Arc<dyn Publication> {
        Arc::clone(&self.data_publication)
    }

    /// Returns the control publication.
    #[must_use]
    pub fn control_publication(&self) -> Arc<dyn Publication> {
        Arc::clone(&self.control_publication)
    }

    /// Binds `handler` to the data subscription.
    ///
    /// # Returns
    /// `None` if the data subscription was already taken.
    pub fn subscribe_data<H: FragmentHandler>(&mut self, handler: H) -> Option<Subscription<H>> {
        self.data_source
            .take()
            .map(|source| Subscription::new(source, handler))
    }

    /// Binds `handler` to the control subscription.
    ///
    /// # Returns
    /// `None` if the control subscription was already taken.
    pub fn subscribe_control<H: FragmentHandler>(
        &mut self,
        handler: H,
    ) -> Option<Subscription<H>> {
        self.control_source
            .take()
            .map(|source| Subscription::new(source, handler))
    }

    /// Closes both publications.
    pub fn close(&self) {
        self.data_publication.close();
        self.control_publication.close();
        info!("replication streams closed");
    }
}
