//! Shared names and limits agreed with the self-play engine.

/// Marker every victim participant name carries.
pub const VICTIM_NAME_PREFIX: &str = "victim-";

/// Paired/colored evaluators embed this separator and are never victims.
pub const EVALUATOR_SEPARATOR: &str = "__";

/// Key of the game hash inside the root comment (`C`) of a transcript.
pub const GAME_HASH_KEY: &str = "gameHash";

/// Override-config file the engine re-reads for victim search settings.
pub const OVERRIDE_CONFIG_NAME: &str = "victim.cfg";

/// Override key for the victim's visit budget.
pub const MAX_VISITS_VICTIM_KEY: &str = "maxVisits0";

/// Override key for the adversary's visit budget.
pub const MAX_VISITS_ADV_KEY: &str = "maxVisits1";

/// Extension of the append-only transcript files written by self-play.
pub const SELFPLAY_RECORD_EXTENSION: &str = "sgfs";

/// Files in the output directory that are never victim artifacts.
pub const IGNORED_ARTIFACT_EXTENSIONS: [&str; 2] = ["cfg", "conf"];

/// Suffix appended to the output directory name to form the staging directory.
pub const STAGING_DIR_SUFFIX: &str = "_tmp";

pub const PUBLISH_MAX_ATTEMPTS: u32 = 10;
pub const PUBLISH_RETRY_DELAY_SECS: u64 = 10;

pub const DEFAULT_GAMES_FOR_COMPUTE: usize = 1000;
pub const DEFAULT_CHECKING_PERIODICITY_SECS: u64 = 60;
