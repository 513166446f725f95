use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};
use std::io;

use fix_gateway::session::Start;
use fix_gateway::{routes, Gateway, Settings};

#[macro_use]
extern crate log;
extern crate env_logger;

fn ssl_acceptor(settings: &Settings) -> io::Result<openssl::ssl::SslAcceptorBuilder> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls()).map_err(io::Error::other)?;
    builder
        .set_private_key_file(&settings.server.private_key, SslFiletype::PEM)
        .map_err(io::Error::other)?;
    builder
        .set_certificate_chain_file(&settings.server.cert_chain)
        .map_err(io::Error::other)?;
    Ok(builder)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let settings = Settings::load("configuration.toml").map_err(|e| {
        error!("Invalid configuration: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e)
    })?;
    settings.log_settings();

    let gateway = Gateway::start(&settings).map_err(|e| {
        error!("Error starting gateway: {}", e);
        io::Error::other(e)
    })?;
    if settings.session.auto_start {
        match gateway.session.send(Start).await {
            Ok(Ok(outcome)) => info!("Session auto-start: {:?}", outcome),
            Ok(Err(e)) => error!("Error starting client: {}", e),
            Err(e) => error!("Error starting client: {}", e),
        }
    }

    let gateway = web::Data::new(gateway);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(gateway.clone())
            .configure(routes::configure)
    });

    let address = settings.bind_address();
    if settings.server.use_ssl {
        info!("Starting gateway on {}:{} using SSL", address.0, address.1);
        server.bind_openssl(address, ssl_acceptor(&settings)?)?.run().await
    } else {
        info!("Starting gateway on {}:{} without SSL", address.0, address.1);
        server.bind(address)?.run().await
    }
}
