//! Scripted HTTP transport for tests.
//!
//! Routes match on method and a URL substring, optionally narrowed by a query
//! parameter. Each route replays its responses in order and then keeps
//! returning the last one. Unmatched requests get a 404.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use crate::error::ProviderResult;
use crate::provider::BoxFuture;
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};

#[derive(Debug)]
struct Route {
    method: HttpMethod,
    needle: String,
    query: Option<(String, String)>,
    responses: VecDeque<HttpResponse>,
}

impl Route {
    fn matches(&self, request: &HttpRequest) -> bool {
        self.method == request.method
            && request.url.contains(&self.needle)
            && self
                .query
                .as_ref()
                .is_none_or(|(k, v)| request.query_value(k) == Some(v.as_str()))
    }
}

/// A transport that answers from scripted routes and records every request.
#[derive(Debug, Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    /// Creates a transport with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a response for requests whose URL contains `needle`.
    ///
    /// Calling this again with the same method and needle queues another
    /// response on the same route.
    pub fn on(self, method: HttpMethod, needle: &str, response: HttpResponse) -> Self {
        self.push(method, needle, None, response);
        self
    }

    /// Like [`FakeTransport::on`], but also requires a query parameter value.
    pub fn on_query(
        self,
        method: HttpMethod,
        needle: &str,
        query: (&str, &str),
        response: HttpResponse,
    ) -> Self {
        self.push(
            method,
            needle,
            Some((query.0.to_string(), query.1.to_string())),
            response,
        );
        self
    }

    fn push(
        &self,
        method: HttpMethod,
        needle: &str,
        query: Option<(String, String)>,
        response: HttpResponse,
    ) {
        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == method && r.needle == needle && r.query == query)
        {
            route.responses.push_back(response);
            return;
        }
        routes.push(Route {
            method,
            needle: needle.to_string(),
            query,
            responses: VecDeque::from([response]),
        });
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Counts requests whose URL contains `needle`.
    pub fn count(&self, needle: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.url.contains(needle))
            .count()
    }

    fn respond(&self, request: HttpRequest) -> HttpResponse {
        let response = {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            routes
                .iter_mut()
                .find(|r| r.matches(&request))
                .and_then(|route| {
                    if route.responses.len() > 1 {
                        route.responses.pop_front()
                    } else {
                        route.responses.front().cloned()
                    }
                })
        };
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        response.unwrap_or_else(|| {
            HttpResponse::new(404, format!("no route for {} {}", request.method, request.url))
        })
    }
}

impl HttpTransport for FakeTransport {
    fn send(&self, request: HttpRequest) -> BoxFuture<'_, ProviderResult<HttpResponse>> {
        let response = self.respond(request);
        Box::pin(async move { Ok(response) })
    }
}
