//! Smoke run: a built-in sample workload against the simulated cluster.
//!
//! Exercises the full engine end to end (setup, parallel FSM workers with
//! hard and soft assertions, mid-run fault injection, teardown) and exits
//! nonzero on a FAIL verdict.
//!
//! ```bash
//! smoke --seed 42 --profile stress
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use clap::Parser;
use rand::Rng;
use serde_json::json;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use scrimmage::profiles::{list_profiles, load_profile};
use scrimmage::{
    controller, ClusterFixture, HookError, Namespace, Ownership, RunOptions, SimCluster, SimConn,
    Verdict, WorkloadConfig,
};

/// Scrimmage smoke runner.
#[derive(Parser, Debug)]
#[command(name = "smoke")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Global seed for the run.
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Built-in profile to take multipliers from (smoke, default, stress, soak).
    #[arg(long)]
    profile: Option<String>,

    /// Multiplier applied to the workload's thread count (ignored if --profile is set).
    #[arg(long, default_value = "1.0")]
    thread_multiplier: f64,

    /// Multiplier applied to the workload's iteration count (ignored if --profile is set).
    #[arg(long, default_value = "1.0")]
    iteration_multiplier: f64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// List the built-in profiles and exit.
    #[arg(long)]
    list_profiles: bool,
}

const SETUP_MARKER: &str = "__seeded";

/// Builds the sample workload: inserts, reads, and removes of tid-prefixed
/// documents in one shared namespace, plus a low-probability state that
/// bounces a node while traffic is in flight.
///
/// Every worker tracks its own live keys as a contiguous range `0..next` in
/// its private data, so "my documents all exist" is a hard invariant while
/// "the namespace holds exactly my documents" is only a when-exclusive one.
fn sample_workload(cluster: &SimCluster) -> WorkloadConfig<SimConn> {
    let bounce_target = cluster.clone();

    WorkloadConfig::builder()
        .thread_count(8)
        .iterations(250)
        .ownership(Ownership::Shared)
        .data(json!({ "next": 0 }))
        .setup(|conn: &SimConn, ns, _| {
            conn.drop_namespace(ns)?;
            conn.insert(ns, SETUP_MARKER, json!({ "seeded": true }))?;
            Ok(())
        })
        .teardown(|conn: &SimConn, ns, _| {
            if conn.get(ns, SETUP_MARKER)?.is_none() {
                return Err(HookError::failed("setup marker lost during run"));
            }
            conn.drop_namespace(ns)?;
            Ok(())
        })
        .state("init", |ctx, conn: &SimConn, ns, _| {
            let marker = conn.get(ns, SETUP_MARKER)?;
            ctx.checks.always(marker.is_some(), "setup marker missing")
        })
        .state("insert", |ctx, conn: &SimConn, ns, _| {
            let next = ctx.data["next"].as_u64().unwrap_or(0);
            let key = format!("{}:{next}", ctx.tid());
            conn.insert(ns, key, json!({ "tid": ctx.tid(), "n": next }))?;
            ctx.data["next"] = json!(next + 1);
            Ok(())
        })
        .state("read", |ctx, conn: &SimConn, ns, _| {
            let next = ctx.data["next"].as_u64().unwrap_or(0);
            if next == 0 {
                return Ok(());
            }
            let pick = ctx.rng.gen_range(0..next);
            let doc = conn.get(ns, &format!("{}:{pick}", ctx.tid()))?;
            ctx.checks
                .always(doc.is_some(), format!("own document {pick} lost"))?;

            // Other workers' documents legitimately inflate the count; the
            // exact-count check only holds when we own the namespace.
            let count = conn.count(ns)? as u64;
            ctx.checks
                .always(count > next, "namespace lost documents")?;
            ctx.checks
                .when_exclusive_eq(count, next + 1, "namespace document count")
        })
        .state("remove", |ctx, conn: &SimConn, ns, _| {
            let next = ctx.data["next"].as_u64().unwrap_or(0);
            if next == 0 {
                return Ok(());
            }
            let removed = conn.remove(ns, &format!("{}:{}", ctx.tid(), next - 1))?;
            ctx.checks
                .always(removed, "own document vanished before remove")?;
            ctx.data["next"] = json!(next - 1);
            Ok(())
        })
        .state("bounce", move |_, _, _, _| {
            // Fault injection concurrent with sibling traffic. Connections
            // bound to the other nodes keep serving throughout.
            bounce_target
                .restart_node("gamma")
                .map_err(scrimmage::StateError::from)
        })
        .transition("init", "insert", 1.0)
        .transition("insert", "insert", 0.5)
        .transition("insert", "read", 0.3)
        .transition("insert", "remove", 0.15)
        .transition("insert", "bounce", 0.05)
        .transition("read", "insert", 0.6)
        .transition("read", "read", 0.3)
        .transition("read", "remove", 0.1)
        .transition("remove", "insert", 0.7)
        .transition("remove", "read", 0.3)
        .transition("bounce", "insert", 1.0)
        .build()
        .expect("sample workload is statically valid")
}

fn main() {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing subscriber");

    if args.list_profiles {
        for name in list_profiles() {
            println!("{name}");
        }
        return;
    }

    let mut options = match &args.profile {
        Some(name) => match load_profile(name) {
            Ok(profile) => profile.options,
            Err(err) => {
                eprintln!("{err}");
                std::process::exit(2);
            }
        },
        None => RunOptions {
            seed: 0,
            thread_multiplier: args.thread_multiplier,
            iteration_multiplier: args.iteration_multiplier,
        },
    };
    options.seed = args.seed;

    let cluster = SimCluster::new(&["alpha", "beta", "gamma"]);
    let workload = sample_workload(&cluster);
    let namespace = Namespace::new("smokedb", "docs");

    let report = controller::run(&workload, &cluster, &namespace, &cluster, &options);
    report.print_summary();

    if report.verdict() == Verdict::Fail {
        std::process::exit(1);
    }
}
