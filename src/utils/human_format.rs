//! Human-readable formatting for scene timestamps, scores and durations

/// Format a position in seconds as `m:ss`, or `h:mm:ss` from one hour up
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// Format a scene range such as `0:10 - 0:13`
pub fn format_time_range(from: f64, to: f64) -> String {
    format!("{} - {}", format_timestamp(from), format_timestamp(to))
}

/// Convert a `[0, 1]` similarity into a percentage rounded to one decimal
pub fn similarity_percent(similarity: f64) -> f64 {
    (similarity * 1000.0).round() / 10.0
}

/// Format a similarity as `95.0%`
pub fn format_similarity(similarity: f64) -> String {
    format!("{:.1}%", similarity_percent(similarity))
}

/// Formats a time duration in milliseconds to a human-readable string
pub fn format_duration(millis: u64) -> String {
    if millis == 0 {
        return "0ms".to_string();
    }

    if millis < 1000 {
        format!("{}ms", millis)
    } else if millis < 60_000 {
        let seconds = millis as f64 / 1000.0;
        if seconds >= 10.0 {
            format!("{:.1}s", seconds)
        } else {
            format!("{:.2}s", seconds)
        }
    } else {
        let total_seconds = millis / 1000;
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;

        if seconds == 0 {
            format!("{}m", minutes)
        } else {
            format!("{}m{}s", minutes, seconds)
        }
    }
}
