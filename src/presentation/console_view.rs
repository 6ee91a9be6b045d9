// Console renderer - logs a summary line for every published snapshot
use crate::domain::dashboard::DashboardState;
use crate::presentation::view_model::{charts, gauges};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;

pub fn render_line(state: &DashboardState) -> String {
    let link = if state.is_connected() {
        "connected"
    } else {
        "disconnected"
    };
    let gauges = gauges(state)
        .into_iter()
        .map(|g| format!("{}={:.2}{} [{}]", g.channel, g.value, g.unit, g.status_label))
        .collect::<Vec<_>>()
        .join(" ");
    format!("[{link}] {gauges}")
}

const BARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// One bar per value, scaled between the series' own min and max.
pub fn sparkline(values: &[f64]) -> String {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = max - min;
    values
        .iter()
        .map(|&v| {
            if span > 0.0 {
                let level = ((v - min) / span * (BARS.len() - 1) as f64).round() as usize;
                BARS[level.min(BARS.len() - 1)]
            } else {
                BARS[0]
            }
        })
        .collect()
}

/// Runs until the store is dropped. Trends go out at debug level.
pub async fn run_console_view(snapshots: watch::Receiver<Arc<DashboardState>>) {
    let mut stream = WatchStream::new(snapshots);
    while let Some(snapshot) = stream.next().await {
        tracing::info!(target: "dashboard", "{}", render_line(&snapshot));
        for chart in charts(&snapshot).iter().filter(|c| !c.values.is_empty()) {
            tracing::debug!(
                target: "dashboard",
                channel = %chart.channel,
                color = chart.color,
                "{}",
                sparkline(&chart.values)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::channel::ChannelId;
    use chrono::Utc;

    #[test]
    fn test_render_line() {
        let mut state = DashboardState::new([ChannelId::Temperature], 20, 10, Utc::now());
        assert_eq!(render_line(&state), "[disconnected] temp=0.00°C [Normal]");

        state.connection.connected = true;
        assert!(render_line(&state).starts_with("[connected]"));
    }

    #[tokio::test]
    async fn test_console_view_ends_with_sender() {
        let state = DashboardState::new([ChannelId::Humidity], 20, 10, Utc::now());
        let (tx, rx) = watch::channel(Arc::new(state));
        let view = tokio::spawn(run_console_view(rx));
        drop(tx);
        view.await.unwrap();
    }

    #[test]
    fn test_sparkline() {
        assert_eq!(sparkline(&[]), "");
        assert_eq!(sparkline(&[3.0, 3.0]), "▁▁");
        assert_eq!(sparkline(&[0.0, 7.0, 3.5, 1.0]), "▁█▅▂");
    }
}
