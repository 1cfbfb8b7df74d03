//! Region choice for job search: vacancies weighted by how acceptable the
//! commute from the home zone is.

use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::ids::{JobId, RegionId, ZoneId};
use crate::travel::{CommuteProbability, Mode, TravelTimes, PEAK_HOUR_SECONDS};
use crate::vacancy::VacancyIndex;

/// Rounds a travel time to whole minutes, never below one.
/// Unreachable destinations come back as `None`.
pub fn rounded_minutes(travel_time: f64) -> Option<u32> {
    if travel_time.is_finite() {
        Some(travel_time.round().max(1.0) as u32)
    } else {
        None
    }
}

/// Minutes the fallback tier assumes for a region with no usable skim entry.
pub const DEFAULT_FALLBACK_CAP_MINUTES: u32 = 180;

fn usable(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}

#[derive(Clone)]
pub struct RegionSampler {
    travel_times: Arc<dyn TravelTimes>,
    commute: Arc<dyn CommuteProbability>,
    mode: Mode,
    time_of_day_seconds: u32,
    fallback_cap_minutes: u32,
}

impl RegionSampler {
    pub fn new(travel_times: Arc<dyn TravelTimes>, commute: Arc<dyn CommuteProbability>) -> Self {
        Self {
            travel_times,
            commute,
            mode: Mode::Car,
            time_of_day_seconds: PEAK_HOUR_SECONDS,
            fallback_cap_minutes: DEFAULT_FALLBACK_CAP_MINUTES,
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_time_of_day(mut self, seconds: u32) -> Self {
        self.time_of_day_seconds = seconds;
        self
    }

    /// Travel time the fallback tier assigns to unreachable regions. Never
    /// below one minute.
    pub fn with_fallback_cap(mut self, minutes: u32) -> Self {
        self.fallback_cap_minutes = minutes.max(1);
        self
    }

    fn minutes(&self, home: ZoneId, region: RegionId) -> Option<u32> {
        rounded_minutes(self.travel_times.travel_time_minutes(
            home,
            region,
            self.time_of_day_seconds,
            self.mode,
        ))
    }

    /// Weight of every candidate region that has at least one vacancy, in
    /// candidate order.
    ///
    /// With a home zone the weight is `P(commute) * vacancies`. If that sums
    /// to exactly zero, regions are re-weighted by `1 / minutes` instead, so a
    /// long commute still beats unemployment. In that tier an unreachable
    /// region counts as the fallback cap away, so every open region keeps a
    /// positive weight. Without a home zone the weight is the vacancy count
    /// alone.
    pub fn region_weights(
        &self,
        home: Option<ZoneId>,
        regions: &[RegionId],
        vacancies: &VacancyIndex<JobId>,
    ) -> Vec<(RegionId, f64)> {
        let open: Vec<(RegionId, usize)> = regions
            .iter()
            .map(|r| (*r, vacancies.count_in_region(*r)))
            .filter(|(_, count)| *count > 0)
            .collect();

        let Some(home) = home else {
            return open.into_iter().map(|(r, c)| (r, c as f64)).collect();
        };

        let primary: Vec<(RegionId, f64)> = open
            .par_iter()
            .map(|(region, count)| {
                let weight = self.minutes(home, *region).map_or(0.0, |m| {
                    self.commute.probability(m, self.mode) * *count as f64
                });
                (*region, usable(weight))
            })
            .collect();
        if primary.iter().any(|(_, w)| *w > 0.0) {
            return primary;
        }

        debug!(
            home = %home,
            candidates = open.len(),
            "no acceptable commute, falling back to inverse travel time"
        );
        open.par_iter()
            .map(|(region, _)| {
                let minutes = self
                    .minutes(home, *region)
                    .unwrap_or(self.fallback_cap_minutes);
                (*region, usable(1.0 / f64::from(minutes)))
            })
            .collect()
    }

    /// Draws a region proportionally to its weight. `None` when no weight is
    /// positive.
    pub fn select<R: Rng + ?Sized>(weights: &[(RegionId, f64)], rng: &mut R) -> Option<RegionId> {
        let dist = WeightedIndex::new(weights.iter().map(|(_, w)| *w)).ok()?;
        Some(weights[dist.sample(rng)].0)
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::travel::TravelTimeMatrix;

    /// 10 minutes accepted half the time, 60 minutes one time in a hundred,
    /// anything else never.
    struct StepCommute;

    impl CommuteProbability for StepCommute {
        fn probability(&self, minutes: u32, _mode: Mode) -> f64 {
            match minutes {
                10 => 0.5,
                60 => 0.01,
                _ => 0.0,
            }
        }
    }

    struct NeverCommute;

    impl CommuteProbability for NeverCommute {
        fn probability(&self, _minutes: u32, _mode: Mode) -> f64 {
            0.0
        }
    }

    fn vacancies() -> VacancyIndex<JobId> {
        let index = VacancyIndex::new("job");
        index.add(RegionId(1), JobId(1));
        index.add(RegionId(2), JobId(2));
        index
    }

    fn skim() -> Arc<TravelTimeMatrix> {
        Arc::new(
            TravelTimeMatrix::new()
                .with(ZoneId(7), RegionId(1), 10.2)
                .with(ZoneId(7), RegionId(2), 59.6),
        )
    }

    #[test]
    fn commute_probability_times_vacancies() {
        let sampler = RegionSampler::new(skim(), Arc::new(StepCommute));
        let weights =
            sampler.region_weights(Some(ZoneId(7)), &[RegionId(1), RegionId(2)], &vacancies());
        assert_eq!(weights, vec![(RegionId(1), 0.5), (RegionId(2), 0.01)]);

        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let draws = 20_000;
        let hits = (0..draws)
            .filter(|_| RegionSampler::select(&weights, &mut rng) == Some(RegionId(1)))
            .count();
        let share = hits as f64 / draws as f64;
        assert!((share - 0.5 / 0.51).abs() < 0.01, "region 1 drawn {share}");
    }

    #[test]
    fn zero_primary_weight_falls_back_to_inverse_time() {
        let sampler = RegionSampler::new(skim(), Arc::new(NeverCommute));
        let weights =
            sampler.region_weights(Some(ZoneId(7)), &[RegionId(1), RegionId(2)], &vacancies());
        assert_eq!(weights, vec![(RegionId(1), 0.1), (RegionId(2), 1.0 / 60.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(RegionSampler::select(&weights, &mut rng).is_some());
    }

    #[test]
    fn no_home_weights_by_vacancy_count() {
        let index = vacancies();
        index.add(RegionId(2), JobId(3));
        let sampler = RegionSampler::new(skim(), Arc::new(NeverCommute));
        let weights = sampler.region_weights(None, &[RegionId(1), RegionId(2), RegionId(3)], &index);
        assert_eq!(weights, vec![(RegionId(1), 1.0), (RegionId(2), 2.0)]);
    }

    #[test]
    fn unreachable_regions_still_get_fallback_weight() {
        let sampler = RegionSampler::new(Arc::new(TravelTimeMatrix::new()), Arc::new(StepCommute))
            .with_fallback_cap(120);
        let weights =
            sampler.region_weights(Some(ZoneId(7)), &[RegionId(1), RegionId(2)], &vacancies());
        assert_eq!(weights, vec![(RegionId(1), 1.0 / 120.0), (RegionId(2), 1.0 / 120.0)]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let picked = RegionSampler::select(&weights, &mut rng);
        assert!(matches!(picked, Some(RegionId(1)) | Some(RegionId(2))));
    }

    #[test]
    fn fallback_mixes_reachable_and_unreachable_regions() {
        let sampler = RegionSampler::new(skim(), Arc::new(NeverCommute)).with_fallback_cap(200);
        let index = vacancies();
        index.add(RegionId(4), JobId(9));
        let weights = sampler.region_weights(
            Some(ZoneId(7)),
            &[RegionId(1), RegionId(2), RegionId(4)],
            &index,
        );
        assert_eq!(
            weights,
            vec![
                (RegionId(1), 0.1),
                (RegionId(2), 1.0 / 60.0),
                (RegionId(4), 1.0 / 200.0)
            ]
        );
    }

    #[test]
    fn regions_without_vacancies_stay_out_of_the_fallback() {
        let sampler = RegionSampler::new(Arc::new(TravelTimeMatrix::new()), Arc::new(NeverCommute));
        let weights = sampler.region_weights(Some(ZoneId(7)), &[RegionId(3)], &vacancies());
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert!(weights.is_empty());
        assert_eq!(RegionSampler::select(&weights, &mut rng), None);
    }

    #[test]
    fn minutes_are_rounded_and_floored() {
        assert_eq!(rounded_minutes(0.2), Some(1));
        assert_eq!(rounded_minutes(10.5), Some(11));
        assert_eq!(rounded_minutes(f64::INFINITY), None);
    }
}
