//! Command-line front end for the campus errand order system.
//!
//! Acts as a page controller over the order lifecycle: publishes orders,
//! moves them through their lifecycle on behalf of the current user, lists
//! the user's classified views and can keep a list open with a live
//! countdown until interrupted.

use clap::{Args as ClapArgs, Parser, Subcommand};
use errand_config::Config;
use errand_core::{
	CountdownScheduler, LifecycleBuilder, OrderDraft, OrderFilter, OrderLifecycle, PriceExtras,
	SortKey, TransitionOutcome, ViewQuery,
};
use errand_types::{OrderStatus, ServiceType, UserIdentity};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod render;

/// Command-line arguments for the errand service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config/errand.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// Identifier of the acting user
	#[arg(long, env = "ERRAND_USER_ID")]
	user_id: String,

	/// Display name of the acting user
	#[arg(long, env = "ERRAND_USER_NAME", default_value = "")]
	user_name: String,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Price an order without publishing it
	Quote(DraftArgs),
	/// Publish a new order
	Publish(DraftArgs),
	/// Grab a pending order
	Grab { order_id: u64 },
	/// Start working on an accepted order
	Start { order_id: u64 },
	/// Confirm an order as completed
	Complete { order_id: u64 },
	/// Cancel one of your pending orders
	Cancel { order_id: u64 },
	/// Show a single order
	Show { order_id: u64 },
	/// List your classified views
	List(ViewArgs),
	/// Keep the views open with a live countdown
	Watch(ViewArgs),
}

#[derive(ClapArgs, Debug)]
struct DraftArgs {
	/// Service type (express, takeout, supermarket, substitute, courseBrush, other)
	#[arg(value_parser = parse_service_type)]
	service_type: ServiceType,

	/// Service payload as a JSON object in the stored field names
	#[arg(long, default_value = "{}")]
	details: String,

	/// Extra amount offered to riders
	#[arg(long, default_value = "0")]
	boost: Decimal,

	/// Agreed base price for services without a fixed tariff
	#[arg(long)]
	base_price: Option<Decimal>,

	/// Display name of the service
	#[arg(long)]
	service_name: Option<String>,
}

#[derive(ClapArgs, Debug)]
struct ViewArgs {
	/// Only this service type
	#[arg(long, value_parser = parse_service_type)]
	service_type: Option<ServiceType>,

	/// Only this status (applies to your own and accepted orders)
	#[arg(long, value_parser = parse_status)]
	status: Option<OrderStatus>,

	/// Only orders created on this day (YYYY-MM-DD)
	#[arg(long)]
	date: Option<String>,

	/// Sort key (time or price)
	#[arg(long, default_value = "time", value_parser = parse_sort)]
	sort: SortKey,
}

impl ViewArgs {
	fn query(self, user_id: &str) -> ViewQuery {
		ViewQuery {
			user_id: user_id.to_string(),
			filter: OrderFilter {
				service_type: self.service_type,
				status: self.status,
				date: self.date,
			},
			sort: self.sort,
		}
	}
}

fn parse_service_type(s: &str) -> Result<ServiceType, String> {
	s.parse()
}

fn parse_status(s: &str) -> Result<OrderStatus, String> {
	s.parse()
}

fn parse_sort(s: &str) -> Result<SortKey, String> {
	s.parse()
}

/// Main entry point for the errand service.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	// Initialize tracing with env filter
	use tracing_subscriber::{fmt, EnvFilter};

	let default_directive = args.log_level.to_string();
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

	fmt()
		.with_env_filter(env_filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();

	let config = Config::from_file(&args.config).await?;
	tracing::debug!(config = %args.config.display(), storage = %config.storage.primary, "Loaded configuration");

	let tick_period = Duration::from_millis(config.scheduler.tick_interval_ms);
	let lifecycle = Arc::new(LifecycleBuilder::new(config).build()?);

	let name = if args.user_name.is_empty() {
		args.user_id.clone()
	} else {
		args.user_name.clone()
	};
	let user = UserIdentity::new(args.user_id, name);

	run(args.command, lifecycle, &user, tick_period).await
}

async fn run(
	command: Command,
	lifecycle: Arc<OrderLifecycle>,
	user: &UserIdentity,
	tick_period: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
	match command {
		Command::Quote(draft) => {
			let draft = build_draft(draft)?;
			let quote = errand_core::quote(&draft.details, &draft.extras)?;
			println!("{}", render::quote(&quote));
		},
		Command::Publish(draft) => {
			let draft = build_draft(draft)?;
			let (order, quote) = lifecycle.publish(draft, user).await?;
			println!("{}", render::order(&order));
			println!("{}", render::quote(&quote));
		},
		Command::Grab { order_id } => report(lifecycle.grab(order_id, user).await?),
		Command::Start { order_id } => report(lifecycle.start_progress(order_id).await?),
		Command::Complete { order_id } => report(lifecycle.confirm_complete(order_id).await?),
		Command::Cancel { order_id } => report(lifecycle.cancel(order_id, &user.id).await?),
		Command::Show { order_id } => match lifecycle.get(order_id).await {
			Some(order) => println!("{}", serde_json::to_string_pretty(&order)?),
			None => println!("Order {} not found", order_id),
		},
		Command::List(view) => {
			let query = view.query(&user.id);
			let classified = errand_core::scheduler::tick(&lifecycle, &query).await?;
			println!("{}", render::classified(&classified));
		},
		Command::Watch(view) => {
			let scheduler =
				CountdownScheduler::start(lifecycle.clone(), view.query(&user.id), tick_period);
			let mut updates = scheduler.view();
			tracing::info!(user_id = %user.id, "Watching orders, press Ctrl-C to stop");
			loop {
				tokio::select! {
					changed = updates.changed() => {
						if changed.is_err() {
							break;
						}
						let view = updates.borrow_and_update().clone();
						println!("{}", render::classified(&view));
					}
					_ = tokio::signal::ctrl_c() => {
						tracing::info!("Stopping watch");
						break;
					}
				}
			}
			drop(scheduler);
		},
	}
	Ok(())
}

fn build_draft(args: DraftArgs) -> Result<OrderDraft, Box<dyn std::error::Error>> {
	let details = render::parse_details(args.service_type, &args.details)?;
	Ok(OrderDraft {
		details,
		extras: PriceExtras {
			boost: args.boost,
			base_price: args.base_price,
		},
		service_name: args.service_name,
	})
}

fn report(outcome: TransitionOutcome) {
	match outcome {
		TransitionOutcome::Applied(order) => println!("{}", render::order(&order)),
		TransitionOutcome::Rejected(reason) => println!("Nothing changed: {}", reason),
	}
}
