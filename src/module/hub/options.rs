use crate::library::helpers::parse_seconds;
use crate::module::options::RedisOptions;
use std::time::Duration;
use structopt::StructOpt;

/// Options for the hub module
#[derive(Debug, StructOpt)]
pub struct Options {
    /// Port on which subscriptions and events are accepted
    #[structopt(long, env, default_value = "48080")]
    pub port: u16,

    /// Number of consecutive failed pushes after which a subscription is removed
    ///
    /// A subscription is removed once its failure counter exceeds this value.
    #[structopt(long, env, default_value = "3")]
    pub max_failed_pushes: u32,

    /// Duration (in seconds) during which an identical message is not pushed to the same subscription again
    #[structopt(long, env, default_value = "3600", parse(try_from_str = parse_seconds))]
    pub dedup_retention: Duration,

    /// Maximum duration (in seconds) a subscriber may take to respond to a push
    #[structopt(long, env, default_value = "10", parse(try_from_str = parse_seconds))]
    pub push_timeout: Duration,

    /// Number of pushes that may be in flight concurrently for a single event
    #[structopt(long, env, default_value = "16")]
    pub push_concurrency: usize,

    /// Interval (in seconds) at which expired deduplication entries and subscriptions are purged
    #[structopt(long, env, default_value = "60", parse(try_from_str = parse_seconds))]
    pub maintenance_interval: Duration,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,
}
