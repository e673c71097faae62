// sqlbackup/src/backup/header.rs
use chrono::{Local, NaiveDateTime};

use crate::config::Configuration;

pub const TOOL_NAME: &str = "sqlbackup";
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Minimum Rust toolchain the binary was built against.
pub const RUST_VERSION: &str = env!("CARGO_PKG_RUST_VERSION");

/// Builds the comment block and session pragmas that open every dump artifact.
pub fn format_header(engine_version: &str, config: &Configuration) -> String {
    format_header_at(engine_version, config, Local::now().naive_local())
}

/// Same as [`format_header`] with an explicit generation time.
///
/// Apart from the generation time and the two version strings the output is
/// byte-identical for a given configuration.
pub fn format_header_at(
    engine_version: &str,
    config: &Configuration,
    generated_at: NaiveDateTime,
) -> String {
    let generation_time = format!(
        "{} at {}",
        generated_at.format("%b %d, %Y"),
        generated_at.format("%I:%M %p")
    );

    let lines = [
        format!("-- {} SQL Dump", TOOL_NAME),
        format!("-- Version {}", TOOL_VERSION),
        "--".to_string(),
        format!("-- Host: {}:{}", config.host, config.port),
        format!("-- Generation Time: {}", generation_time),
        format!("-- MySQL Server Version: {}", engine_version),
        format!(
            "-- Platform: {} {} (Rust {}+)",
            std::env::consts::OS,
            std::env::consts::ARCH,
            RUST_VERSION
        ),
        String::new(),
        "SET SQL_MODE = \"NO_AUTO_VALUE_ON_ZERO\";".to_string(),
        "SET AUTOCOMMIT = 0;".to_string(),
        "START TRANSACTION;".to_string(),
        "SET time_zone = \"+00:00\";".to_string(),
        String::new(),
        "/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;".to_string(),
        "/*!40101 SET @OLD_CHARACTER_SET_RESULTS=@@CHARACTER_SET_RESULTS */;".to_string(),
        "/*!40101 SET @OLD_COLLATION_CONNECTION=@@COLLATION_CONNECTION */;".to_string(),
        "/*!40101 SET NAMES utf8mb4 */;".to_string(),
        String::new(),
        "--".to_string(),
        format!("-- Database: `{}`", config.db_name),
        "--".to_string(),
    ];
    lines.join("\n")
}
