//! Peripheral Module
//!
//! The domain-side coordinator: issues requests, and is the sink the event
//! loop dispatches into.
//!
//! ## Responsibilities
//! - Issue blocking and non-blocking requests through the driver
//! - Route completions to the correlator
//! - Keep the connection table current
//! - Route attribute sub-events to the handler for their handle
//! - Send the resulting responses back through the driver

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::attribute::AttributeValue;
use crate::config::Config;
use crate::correlator::Correlator;
use crate::driver::{Driver, EventSink, HardwareEvent, Operation, Request};
use crate::error::{GattError, Result};
use crate::gatt::{
    AttResponse, AttStatus, AttributeHandler, ConnectionTable, ExecWriteRequest, ReadRequest,
    WriteRequest, ATT_OPCODE_LEN,
};

/// Whether a request waits for its completion event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Block the calling thread until completion or timeout
    Blocking,

    /// Return once the stack accepted the request
    NonBlocking,
}

/// The peripheral
///
/// ## Concurrency Model
///
/// - **Caller threads**: `request` and the attribute table accessors
/// - **Event context**: `deliver`, one event at a time
///
/// `request` in blocking mode must not be called from the event context:
/// the completion it waits for would queue behind it.
pub struct Peripheral<D> {
    config: Config,

    driver: D,

    /// Blocking requests waiting on completions, keyed by request key
    correlator: Correlator<u16, Operation>,

    connections: ConnectionTable,

    /// Attribute handlers by handle
    attributes: RwLock<HashMap<u16, Arc<AttributeHandler>>>,
}

impl<D: Driver> Peripheral<D> {
    pub fn new(config: Config, driver: D) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            correlator: Correlator::new(config.completion_timeout()),
            connections: ConnectionTable::new(config.default_peer_mtu, config.local_mtu),
            attributes: RwLock::new(HashMap::new()),
            driver,
            config,
        })
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Issue `operation` for `key`
    ///
    /// Blocking mode returns:
    /// - `Ok(())` when the completion reported success
    /// - `Err(Failed)` when it reported failure or the driver refused
    /// - `Err(OutcomeUnknown)` on timeout or when the same request is
    ///   already being waited on
    pub fn request(&self, operation: Operation, key: u16, mode: RequestMode) -> Result<()> {
        let request = Request { operation, key };

        match mode {
            RequestMode::NonBlocking => self.driver.submit(request),
            RequestMode::Blocking => {
                let outcome = self
                    .correlator
                    .wait(key, operation, || self.driver.submit(request));

                match outcome {
                    Some(true) => Ok(()),
                    Some(false) => Err(GattError::Failed { operation, key }),
                    None => Err(GattError::OutcomeUnknown { operation, key }),
                }
            }
        }
    }

    // =========================================================================
    // Attribute table
    // =========================================================================

    /// Serve a new attribute at `handle`
    pub fn attribute_add(
        &self,
        handle: u16,
        initial: impl Into<Bytes>,
    ) -> Result<Arc<AttributeHandler>> {
        let mut attributes = self.attributes.write();
        if attributes.contains_key(&handle) {
            return Err(GattError::DuplicateAttribute(handle));
        }

        let value = Arc::new(AttributeValue::new(initial));
        let handler = Arc::new(AttributeHandler::new(handle, value));
        attributes.insert(handle, Arc::clone(&handler));

        info!(handle, "Attribute added");
        Ok(handler)
    }

    pub fn attribute(&self, handle: u16) -> Option<Arc<AttributeHandler>> {
        self.attributes.read().get(&handle).cloned()
    }

    pub fn attribute_remove(&self, handle: u16) -> Result<Arc<AttributeHandler>> {
        let removed = self
            .attributes
            .write()
            .remove(&handle)
            .ok_or(GattError::UnknownAttribute(handle))?;

        info!(handle, "Attribute removed");
        Ok(removed)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn correlator(&self) -> &Correlator<u16, Operation> {
        &self.correlator
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    fn handlers(&self) -> Vec<Arc<AttributeHandler>> {
        self.attributes.read().values().cloned().collect()
    }

    fn on_completed(&self, operation: Operation, key: Option<u16>, success: bool) {
        match key {
            Some(key) => {
                self.correlator.notify(&key, operation, success);
            }
            None => {
                self.correlator.notify_all(operation, success);
            }
        }
    }

    fn on_disconnected(&self, conn: u16) {
        self.connections.disconnect(conn);
        for handler in self.handlers() {
            handler.handle_disconnect(conn);
        }
    }

    fn on_read(&self, request: ReadRequest) {
        let Some(handler) = self.attribute(request.handle) else {
            warn!(handle = request.handle, conn = request.conn, "Read of unknown attribute");
            if request.need_rsp {
                self.send(AttResponse::status(
                    request.conn,
                    request.trans_id,
                    request.handle,
                    AttStatus::InvalidHandle,
                ));
            }
            return;
        };

        let payload_limit = self.connections.payload_limit(request.conn).unwrap_or_else(|| {
            warn!(conn = request.conn, "Read on unknown connection, assuming default MTU");
            self.config.default_peer_mtu as usize - ATT_OPCODE_LEN
        });

        if let Some(response) = handler.handle_read(&request, payload_limit) {
            self.send(response);
        }
    }

    fn on_write(&self, request: WriteRequest) {
        let Some(handler) = self.attribute(request.handle) else {
            warn!(handle = request.handle, conn = request.conn, "Write to unknown attribute");
            if request.need_rsp {
                self.send(AttResponse::status(
                    request.conn,
                    request.trans_id,
                    request.handle,
                    AttStatus::InvalidHandle,
                ));
            }
            return;
        };

        if let Some(response) = handler.handle_write(&request) {
            self.send(response);
        }
    }

    fn on_exec_write(&self, request: ExecWriteRequest) {
        let applied = self
            .handlers()
            .iter()
            .filter(|handler| handler.handle_exec_write(&request))
            .count();

        debug!(conn = request.conn, applied, commit = request.commit, "Execute write done");

        // One answer per execute request, whether or not anything was queued
        self.send(AttResponse::status(request.conn, request.trans_id, 0, AttStatus::Ok));
    }

    fn send(&self, response: AttResponse) {
        let (conn, trans_id) = (response.conn, response.trans_id);
        if let Err(e) = self.driver.respond(response) {
            warn!(conn, trans_id, "Response failed: {}", e);
        }
    }
}

impl<D: Driver> EventSink for Peripheral<D> {
    fn deliver(&self, event: HardwareEvent) {
        match event {
            HardwareEvent::Completed {
                operation,
                key,
                success,
            } => self.on_completed(operation, key, success),
            HardwareEvent::Connected { conn, addr } => self.connections.connect(conn, addr),
            HardwareEvent::Disconnected { conn } => self.on_disconnected(conn),
            HardwareEvent::MtuChanged { conn, mtu } => {
                if let Err(e) = self.connections.set_mtu(conn, mtu) {
                    warn!(conn, mtu, "MTU update ignored: {}", e);
                }
            }
            HardwareEvent::Read(request) => self.on_read(request),
            HardwareEvent::Write(request) => self.on_write(request),
            HardwareEvent::ExecWrite(request) => self.on_exec_write(request),
        }
    }
}
