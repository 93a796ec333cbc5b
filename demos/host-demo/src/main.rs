use async_trait::async_trait;
use hostweave::di::Resolve;
use hostweave::feature::{FeatureDescriptor, FeatureManager, FeatureRef};
use hostweave::lifecycle::{
    AppContext, Application, BehaviorScope, ConsoleAttendant, HookResult, LifecycleBehavior,
    os_shutdown_token,
};
use hostweave::{AppArgs, Injectable, Lifetime, RuntimeOptions, ServiceDescriptor};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

pub trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

pub struct PlainGreeter;

impl Greeter for PlainGreeter {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {name}")
    }
}

/// Replaces [`PlainGreeter`] whenever it is registered.
pub struct PirateGreeter;

impl Greeter for PirateGreeter {
    fn greet(&self, name: &str) -> String {
        format!("Ahoy, {name}")
    }
}

pub trait Reporter: Send + Sync {
    fn report(&self) -> String;
}

pub struct UptimeReporter {
    greeter: Arc<dyn Greeter>,
    started: Instant,
}

impl Injectable for UptimeReporter {
    fn inject(resolver: &dyn Resolve) -> hostweave::Result<Self> {
        Ok(Self {
            greeter: resolver.get::<dyn Greeter>()?,
            started: Instant::now(),
        })
    }
}

impl Reporter for UptimeReporter {
    fn report(&self) -> String {
        format!(
            "{} (up {:?})",
            self.greeter.greet("operator"),
            self.started.elapsed()
        )
    }
}

struct Storage;

#[async_trait]
impl FeatureManager for Storage {
    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor::new("storage", "1.0.0").required(true)
    }

    async fn initialize(&self, _context: &AppContext, _token: &CancellationToken) -> anyhow::Result<()> {
        tracing::info!("Opening storage");
        Ok(())
    }

    async fn finalize(&self, _context: &AppContext, _token: &CancellationToken) -> anyhow::Result<()> {
        tracing::info!("Flushing storage");
        Ok(())
    }
}

struct Reporting;

#[async_trait]
impl FeatureManager for Reporting {
    fn descriptor(&self) -> FeatureDescriptor {
        FeatureDescriptor::new("reporting", "1.0.0").depends_on("storage")
    }

    async fn initialize(&self, context: &AppContext, _token: &CancellationToken) -> anyhow::Result<()> {
        let reporter = context.resolve::<dyn Reporter>()?;
        tracing::info!("{}", reporter.report());

        if context.args().flag("once") {
            context.shutdown_handle().request_shutdown();
        }
        Ok(())
    }
}

struct Timing {
    started: std::sync::Mutex<Option<Instant>>,
}

#[async_trait]
impl LifecycleBehavior for Timing {
    fn name(&self) -> &str {
        "timing"
    }

    fn scope(&self) -> BehaviorScope {
        BehaviorScope::Feature(FeatureRef::new("reporting"))
    }

    async fn before_initialize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
        *self.started.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(Instant::now());
        Ok(())
    }

    async fn after_initialize(&self, _context: &AppContext, _token: &CancellationToken) -> HookResult {
        if let Some(started) = *self.started.lock().unwrap_or_else(std::sync::PoisonError::into_inner) {
            tracing::info!("reporting initialized in {:?}", started.elapsed());
        }
        Ok(())
    }
}

fn services() -> Vec<ServiceDescriptor> {
    vec![
        ServiceDescriptor::contract::<dyn Greeter>(),
        ServiceDescriptor::instance::<dyn Greeter, PlainGreeter>(Arc::new(PlainGreeter))
            .override_priority(10),
        ServiceDescriptor::instance::<dyn Greeter, PirateGreeter>(Arc::new(PirateGreeter))
            .override_priority(20)
            .overriding::<PlainGreeter>(),
        ServiceDescriptor::contract::<dyn Reporter>().with_lifetime(Lifetime::Singleton),
        ServiceDescriptor::implementation::<dyn Reporter, UptimeReporter>(|r| r as Arc<dyn Reporter>),
    ]
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = RuntimeOptions::from_env()?;
    let app = Application::builder()
        .provider(&services())
        .feature(Arc::new(Reporting))
        .feature(Arc::new(Storage))
        .behavior(Arc::new(Timing {
            started: std::sync::Mutex::new(None),
        }))
        .attendant(Arc::new(ConsoleAttendant::new(options.quit_command.clone())))
        .options(options)
        .on_cleanup(|| {
            tracing::info!("Goodbye");
            Ok(())
        })
        .build();

    let args = AppArgs::parse(std::env::args().skip(1));
    let outcome = app.bootstrap(args, &os_shutdown_token()).await;

    // Finalizes anything an `Ignore` left running; a no-op otherwise.
    app.shutdown(&CancellationToken::new()).await;

    let outcome = outcome?;
    tracing::info!("Stopped with {}", outcome.instruction());
    Ok(())
}
