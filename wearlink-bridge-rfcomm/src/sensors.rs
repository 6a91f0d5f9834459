//! Simulated sensor host.
//!
//! Produces a resting heart rate that drifts around a baseline and a
//! gravity-dominated acceleration vector with a little noise, one tokio task
//! per feed.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};
use wearlink_bridge_framework::{FeedHandle, Reading, SamplingRate, SensorHost, SensorKind};

use crate::config::SensorsConfig;

/// Standard gravity, m/s².
const GRAVITY: f64 = 9.81;

/// Period used for `SamplingRate::Fastest`.
const FASTEST_PERIOD: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct SimulatedSensorHost {
    config: SensorsConfig,
}

impl SimulatedSensorHost {
    pub fn new(config: SensorsConfig) -> Self {
        Self { config }
    }

    fn rng(&self, kind: SensorKind) -> SmallRng {
        match self.config.seed {
            // Distinct streams per feed from one seed.
            Some(seed) => SmallRng::seed_from_u64(seed ^ kind as u64),
            None => SmallRng::from_os_rng(),
        }
    }
}

impl SensorHost for SimulatedSensorHost {
    fn has_sensor(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::HeartRate => self.config.heart_rate.enabled,
            SensorKind::Accelerometer => self.config.accelerometer.enabled,
        }
    }

    fn start_feed(
        &self,
        kind: SensorKind,
        rate: SamplingRate,
        tx: mpsc::Sender<Reading>,
    ) -> FeedHandle {
        let mut rng = self.rng(kind);
        let baseline = self.config.baseline_bpm;
        let period = if rate.period().is_zero() {
            FASTEST_PERIOD
        } else {
            rate.period()
        };

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut bpm = baseline;

            loop {
                interval.tick().await;

                let reading = match kind {
                    SensorKind::HeartRate => {
                        // Random walk pulled back toward the baseline.
                        bpm += rng.random_range(-1.5_f64..1.5) + (baseline - bpm) * 0.1;
                        Reading::heart_rate(bpm.clamp(40.0, 200.0))
                    }
                    SensorKind::Accelerometer => Reading::acceleration(
                        rng.random_range(-0.3..0.3),
                        rng.random_range(-0.3..0.3),
                        GRAVITY + rng.random_range(-0.2..0.2),
                    ),
                };

                match tx.try_send(reading) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        trace!(kind = %kind, "Feed channel full, skipping sample");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            debug!(kind = %kind, "Simulated feed finished");
        });

        debug!(kind = %kind, period_ms = period.as_millis() as u64, "Simulated feed started");
        FeedHandle::from_task(kind, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SensorToggle;

    fn host(seed: u64) -> SimulatedSensorHost {
        SimulatedSensorHost::new(SensorsConfig {
            seed: Some(seed),
            ..Default::default()
        })
    }

    #[test]
    fn test_disabled_sensor() {
        let host = SimulatedSensorHost::new(SensorsConfig {
            heart_rate: SensorToggle { enabled: false },
            ..Default::default()
        });
        assert!(!host.has_sensor(SensorKind::HeartRate));
        assert!(host.has_sensor(SensorKind::Accelerometer));
    }

    #[tokio::test]
    async fn test_heart_rate_is_plausible() {
        let (tx, mut rx) = mpsc::channel(16);
        let _feed = host(1).start_feed(SensorKind::HeartRate, SamplingRate::Fastest, tx);

        for _ in 0..10 {
            let reading = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            match reading {
                Reading::HeartRate { bpm } => assert!((40.0..=200.0).contains(&bpm)),
                other => panic!("unexpected reading {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_acceleration_is_gravity_dominated() {
        let (tx, mut rx) = mpsc::channel(16);
        let _feed = host(2).start_feed(SensorKind::Accelerometer, SamplingRate::Game, tx);

        let reading = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match reading {
            Reading::Acceleration { x, y, z } => {
                assert!(x.abs() < 0.5 && y.abs() < 0.5);
                assert!((z - GRAVITY).abs() < 0.5);
            }
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stop_ends_feed() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut feed = host(3).start_feed(SensorKind::HeartRate, SamplingRate::Fastest, tx);
        assert_eq!(feed.kind(), SensorKind::HeartRate);

        feed.stop();

        // Drain whatever was sent before the stop; the sender is then dropped.
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}
