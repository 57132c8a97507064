use std::{rc::Rc, time::Instant};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{Method, StatusCode},
};
use colored::{ColoredString, Colorize};
use futures::future::{LocalBoxFuture, Ready, ready};

/// One line per request: status, method, path, elapsed time and query.
/// Server errors are logged at `warn`, everything else at `info`.
#[derive(Default)]
pub struct LoggerMiddleware;

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = LoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Rc<S>,
}

struct RequestLine {
    method: Method,
    path: String,
    query: String,
    started: Instant,
}

impl RequestLine {
    fn finish(self, status: StatusCode) {
        let level = if status.is_server_error() {
            log::Level::Warn
        } else {
            log::Level::Info
        };
        log::log!(
            level,
            "[{}] {} {} {} {}",
            paint_status(status),
            paint_method(&self.method),
            self.path.bright_white(),
            format!("({}ms)", self.started.elapsed().as_millis()).bright_black(),
            self.query.bright_cyan(),
        );
    }
}

fn paint_status(status: StatusCode) -> ColoredString {
    let code = status.as_u16().to_string();
    if status.is_success() {
        code.green()
    } else if status.is_client_error() {
        code.bright_red()
    } else if status.is_server_error() {
        code.red()
    } else {
        code.yellow()
    }
}

fn paint_method(method: &Method) -> ColoredString {
    match *method {
        Method::GET => method.as_str().blue(),
        Method::POST => method.as_str().yellow(),
        _ => method.as_str().normal(),
    }
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let line = RequestLine {
            method: req.method().clone(),
            path: req.path().to_string(),
            query: req.query_string().to_string(),
            started: Instant::now(),
        };
        let srv = Rc::clone(&self.service);

        Box::pin(async move {
            match srv.call(req).await {
                Ok(res) => {
                    line.finish(res.status());
                    Ok(res)
                }
                Err(err) => {
                    line.finish(err.as_response_error().status_code());
                    Err(err)
                }
            }
        })
    }
}
