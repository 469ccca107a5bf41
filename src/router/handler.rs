use std::sync::Arc;

use crate::response::ResponseSink;

/// Request type dispatched by the routers
pub type Request = http::Request<Vec<u8>>;

/// Request shared with work that may outlive the dispatch borrow (task fan-out)
pub type SharedRequest = Arc<Request>;

/// A conventional request handler
///
/// Implemented for any `Fn(&mut dyn ResponseSink, &Request)` closure.
pub trait Handler: Send + Sync {
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request);
}

impl<F> Handler for F
where
    F: Fn(&mut dyn ResponseSink, &Request) + Send + Sync,
{
    fn serve(&self, w: &mut dyn ResponseSink, req: &Request) {
        self(w, req)
    }
}
