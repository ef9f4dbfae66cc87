//! JSON-RPC Server
//!
//! Serves the shift lifecycle over JSON-RPC 2.0 on a localhost TCP port.

use crate::handler::RpcHandler;
use crate::types::{
    CancelRequest, ClaimRequest, CreateRequest, EditRequest, FeedbackRequest,
    IdentityGetRequest, IdentitySetRequest, ListRequest, ReassignRequest,
};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::RpcModule;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9631;

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

/// Register one method whose params deserialize into `$req`
macro_rules! register {
    // Params may be omitted entirely
    ($module:expr, $handler:expr, $name:literal, optional $req:ty, $method:ident) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($name, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: Option<$req> = params.parse()?;
                    handler.$method(req.unwrap_or_default()).await
                }
            })
            .map_err(|e| e.to_string())?;
    }};
    ($module:expr, $handler:expr, $name:literal, $req:ty, $method:ident) => {{
        let handler = $handler.clone();
        $module
            .register_async_method($name, move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: $req = params.parse()?;
                    handler.$method(req).await
                }
            })
            .map_err(|e| e.to_string())?;
    }};
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Build the method table
    pub fn module(&self) -> Result<RpcModule<()>, String> {
        let mut module = RpcModule::new(());

        register!(module, self.handler, "shifts.list.v1", optional ListRequest, list);
        register!(module, self.handler, "shifts.create.v1", CreateRequest, create);
        register!(module, self.handler, "shifts.edit.v1", EditRequest, edit);
        register!(module, self.handler, "shifts.claim.v1", ClaimRequest, claim);
        register!(module, self.handler, "shifts.reassign.v1", ReassignRequest, reassign);
        register!(module, self.handler, "shifts.cancel.v1", CancelRequest, cancel);
        register!(module, self.handler, "identity.get.v1", optional IdentityGetRequest, get_identity);
        register!(module, self.handler, "identity.set.v1", IdentitySetRequest, set_identity);
        register!(
            module,
            self.handler,
            "feedback.submit.v1",
            FeedbackRequest,
            submit_feedback
        );

        Ok(module)
    }

    /// Start the JSON-RPC server
    ///
    /// Returns the bound address (useful with port 0) and the server handle.
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), String> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        info!(
            host = %self.config.host,
            port = %self.config.port,
            "Starting JSON-RPC server on TCP"
        );

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| format!("Failed to build server on {}: {}", addr, e))?;
        let local_addr = server
            .local_addr()
            .map_err(|e| format!("Failed to read bound address: {}", e))?;

        let module = self.module()?;
        let handle = server.start(module);

        info!(addr = %local_addr, "JSON-RPC server started successfully");
        Ok((local_addr, handle))
    }
}
