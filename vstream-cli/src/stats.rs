//! Statistics display and formatting

use std::time::Duration;
use vstream::{ClientStats, ServerStats};

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format bandwidth in human-readable form
pub fn format_bandwidth(bps: u64) -> String {
    const KBPS: u64 = 1000;
    const MBPS: u64 = KBPS * 1000;
    const GBPS: u64 = MBPS * 1000;

    if bps >= GBPS {
        format!("{:.2} Gbps", bps as f64 / GBPS as f64)
    } else if bps >= MBPS {
        format!("{:.2} Mbps", bps as f64 / MBPS as f64)
    } else if bps >= KBPS {
        format!("{:.2} Kbps", bps as f64 / KBPS as f64)
    } else {
        format!("{} bps", bps)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

fn throughput_bps(bytes: u64, elapsed: Duration) -> u64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        ((bytes * 8) as f64 / secs) as u64
    } else {
        0
    }
}

/// One-line server summary
pub fn server_summary(stats: &ServerStats, elapsed: Duration) -> String {
    format!(
        "[{:>8}] level {} | frames {} | packets {} | sent {} | rate {} | feedback {}/{} | errors {}{}",
        format_duration(elapsed),
        stats.active_level,
        stats.pacer.frames,
        stats.pacer.datagrams,
        format_bytes(stats.pacer.bytes),
        format_bandwidth(throughput_bps(stats.pacer.bytes, elapsed)),
        stats.feedback.switched,
        stats.feedback.switched + stats.feedback.unchanged + stats.feedback.ignored,
        stats.send_errors,
        if stats.finished { " | finished" } else { "" }
    )
}

/// One-line client summary
pub fn client_summary(stats: &ClientStats, elapsed: Duration) -> String {
    format!(
        "[{:>8}] level {} | buffered {} ({:.1}s) | packets {} | received {} | rate {} | played {}s | rebuffer {} | feedback {}{}",
        format_duration(elapsed),
        stats.video_level,
        stats.buffer.buffered_units,
        stats.buffered_seconds,
        stats.receiver.datagrams,
        format_bytes(stats.receiver.bytes),
        format_bandwidth(throughput_bps(stats.receiver.bytes, elapsed)),
        stats.receiver.played_seconds,
        stats.receiver.rebuffer_ticks,
        stats.feedback_sent,
        if stats.ended { " | ended" } else { "" }
    )
}

/// Log server statistics
pub fn display_server_stats(stats: &ServerStats, elapsed: Duration) {
    tracing::info!("{}", server_summary(stats, elapsed));
}

/// Log client statistics
pub fn display_client_stats(stats: &ClientStats, elapsed: Duration) {
    tracing::info!("{}", client_summary(stats, elapsed));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.00 MB");
    }

    #[test]
    fn test_format_bandwidth() {
        assert_eq!(format_bandwidth(500), "500 bps");
        assert_eq!(format_bandwidth(10_000), "10.00 Kbps");
        assert_eq!(format_bandwidth(10_000_000), "10.00 Mbps");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 01m 01s");
    }

    #[test]
    fn test_server_summary() {
        let mut stats = ServerStats {
            active_level: 2,
            finished: true,
            ..ServerStats::default()
        };
        stats.pacer.frames = 10;
        stats.pacer.bytes = 1000;

        let line = server_summary(&stats, Duration::from_secs(1));
        assert!(line.contains("level 2"));
        assert!(line.contains("frames 10"));
        assert!(line.contains("8.00 Kbps"));
        assert!(line.ends_with("finished"));
    }

    #[test]
    fn test_client_summary() {
        let mut stats = ClientStats {
            video_level: 3,
            buffered_seconds: 1.68,
            ..ClientStats::default()
        };
        stats.buffer.buffered_units = 42;

        let line = client_summary(&stats, Duration::ZERO);
        assert!(line.contains("level 3"));
        assert!(line.contains("buffered 42 (1.7s)"));
        assert!(line.contains("rate 0 bps"));
        assert!(!line.contains("ended"));
    }
}
