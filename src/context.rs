use crate::sink::ResponseSink;
use http::request::Parts;

/// Per-request view handed to the middleware and to downstream handlers.
///
/// A context joins the request head with whichever response sink is
/// currently active. When compression engages, the middleware builds a new
/// context over the decorating writer for the rest of the chain; the
/// original sink becomes active again once the decorator is gone.
pub struct Context<'a> {
    request: &'a Parts,
    response: &'a mut (dyn ResponseSink + 'a),
}

impl<'a> Context<'a> {
    /// Builds a context over a request head and the active response sink.
    pub fn new(request: &'a Parts, response: &'a mut (dyn ResponseSink + 'a)) -> Self {
        Self { request, response }
    }

    /// The request head: method, URI, and headers.
    pub fn request(&self) -> &'a Parts {
        self.request
    }

    /// The active response sink.
    pub fn response(&mut self) -> &mut (dyn ResponseSink + 'a) {
        self.response
    }
}
