//! Example wiring a small service graph with lifecycle hooks
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example lifecycle --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example lifecycle --features logging-pretty
//! ```

use lifecycle_injector::logging;
use lifecycle_injector::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

struct Config {
    database_url: String,
    listen_port: u16,
}

struct Database {
    url: String,
    connected: AtomicBool,
}

struct Server {
    port: u16,
    db: Arc<Database>,
}

#[allow(dead_code)]
struct RequestId(u64);

fn new_database(ctx: &Context) -> Result<Database, BoxError> {
    let config = ctx.inject::<Config>()?;

    ctx.on_start(|hook| {
        let db = hook.inject::<Database>()?;
        db.connected.store(true, Ordering::SeqCst);
        println!("  [Database] connected to {}", db.url);
        Ok(())
    });
    ctx.on_stop(|hook| {
        let db = hook.inject::<Database>()?;
        db.connected.store(false, Ordering::SeqCst);
        println!("  [Database] connection closed");
        Ok(())
    });

    Ok(Database {
        url: config.database_url.clone(),
        connected: AtomicBool::new(false),
    })
}

fn new_server(ctx: &Context) -> Result<Server, BoxError> {
    let config = ctx.inject::<Config>()?;
    let db = ctx.inject::<Database>()?;
    let port = config.listen_port;

    ctx.on_start(move |_| {
        println!("  [Server] listening on :{port}");
        Ok(())
    });
    ctx.on_stop(|_| {
        println!("  [Server] draining connections");
        Ok(())
    });

    Ok(Server { port, db })
}

fn main() -> Result<(), DiError> {
    // Uses JSON if logging-json is enabled, pretty if logging-pretty is enabled
    logging::init();

    println!("=== Lifecycle Injector Demo ===\n");

    let app = App::new();

    provide_value(Config {
        database_url: "postgres://localhost/app".into(),
        listen_port: 8080,
    })
    .attach(&app);
    provide(new_database).attach(&app);
    provide(new_server).with_name("http").attach(&app);

    // Only registered in debug builds
    provide_value(RequestId(0))
        .when(cfg!(debug_assertions))
        .attach(&app);

    // Background jobs get their own scope, falling back to the app's providers
    let jobs = app.get_scope("jobs");
    provide_factory(|ctx| {
        let db = ctx.inject::<Database>()?;
        ctx.on_stop(|_| {
            println!("  [Jobs] worker stopped");
            Ok(())
        });
        Ok(db.url.len() as u64)
    })
    .with_name("worker")
    .attach(&jobs);

    // Resolve before startup so the hooks are queued for it
    let server = app.inject_named::<Server>("http")?;
    let _ = jobs.inject_named::<u64>("worker")?;

    println!("Starting...");
    app.startup()?;
    println!("State: {}\n", app.cur_state());

    assert!(server.db.connected.load(Ordering::SeqCst));
    println!("Serving on port {}", server.port);

    // Resolved after startup: its start hook runs right away
    invoke_func(&app, |ctx| {
        ctx.on_start(|_| {
            println!("  [Metrics] late start hook ran immediately");
            Ok(())
        });
        Ok(())
    })?;

    println!("\nStopping...");
    app.teardown()?;
    println!("State: {}", app.cur_state());

    assert!(!server.db.connected.load(Ordering::SeqCst));
    println!("\n=== Demo Complete ===");
    Ok(())
}
