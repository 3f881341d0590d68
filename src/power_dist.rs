//! Describing distributions of mining power

use crate::miner::MinerId;

/// Numeric type used to represent mining power.
pub type PowerValue = f64;

/// Determines how mining power is distributed between the miners of a trial.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum PowerDistribution {
    /// Every miner holds `1 / num_miners` of the power.
    #[default]
    Equal,
    /// The given miner holds the given power, and the rest is split equally
    /// between all other miners.
    SetMiner(MinerId, PowerValue),
    /// Miner `i` holds the `i - 1`th value.
    SetValues(Vec<PowerValue>),
}

#[derive(Debug, thiserror::Error)]
pub enum PowerDistributionError {
    #[error("distribution values sum to {0}, not 1.0")]
    BadDistributionSum(PowerValue),
    #[error("power value {0} is not in the range (0.0, 1.0]")]
    BadPowerValue(PowerValue),
    #[error("cannot set power for invalid MinerId {0}")]
    SetMinerBadMinerId(MinerId),
    #[error("cannot leave zero power to the other {0} miners")]
    SetMinerNoPowerLeft(usize),
    #[error("power distribution size {0} does not match miner count {1}")]
    WrongNumMiners(usize, usize),
    #[error("cannot create a distribution for zero miners")]
    ZeroMinersGiven,
}

impl PowerDistribution {
    /// Allowable difference between a distribution sum and 1.0.
    const EPSILON_POWER: PowerValue = 1e-6;

    /// Returns the power held by each miner, in order of [`MinerId`].
    pub fn values(
        &self,
        num_miners: usize,
    ) -> Result<Vec<PowerValue>, PowerDistributionError> {
        use PowerDistributionError::*;

        if num_miners == 0 {
            return Err(ZeroMinersGiven);
        }

        let values = match &self {
            Self::Equal => vec![1.0 / num_miners as PowerValue; num_miners],
            Self::SetValues(dist) => {
                if dist.len() != num_miners {
                    return Err(WrongNumMiners(dist.len(), num_miners));
                }
                dist.clone()
            }
            Self::SetMiner(miner_id, power) => {
                let index = miner_id.get();
                if index == 0 || index > num_miners {
                    return Err(SetMinerBadMinerId(*miner_id));
                }
                if num_miners == 1 {
                    vec![*power]
                } else {
                    if *power >= 1.0 {
                        return Err(SetMinerNoPowerLeft(num_miners - 1));
                    }
                    let other = (1.0 - power) / (num_miners - 1) as PowerValue;
                    let mut dist = vec![other; num_miners];
                    dist[index - 1] = *power;
                    dist
                }
            }
        };

        if let Some(&val) = values
            .iter()
            .find(|&x| x.is_nan() || *x <= 0.0 || *x > 1.0)
        {
            return Err(BadPowerValue(val));
        }

        let sum: PowerValue = values.iter().sum();
        if PowerValue::abs(sum - 1.0) > Self::EPSILON_POWER {
            return Err(BadDistributionSum(sum));
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::{PowerDistribution, PowerDistributionError};
    use crate::miner::MinerId;

    #[test]
    fn power_dist_equal_power() {
        assert_eq!(
            PowerDistribution::Equal.values(4).unwrap(),
            vec![0.25, 0.25, 0.25, 0.25]
        )
    }

    #[test]
    fn power_dist_set_miner() {
        let dist = PowerDistribution::SetMiner(MinerId::from(2), 0.5)
            .values(3)
            .unwrap();
        assert_eq!(dist, vec![0.25, 0.5, 0.25]);
    }

    #[test]
    fn power_dist_rejects_bad_values() {
        assert!(matches!(
            PowerDistribution::SetValues(vec![0.5, 0.6]).values(2),
            Err(PowerDistributionError::BadDistributionSum(_))
        ));
        assert!(matches!(
            PowerDistribution::SetValues(vec![1.0, 0.0]).values(2),
            Err(PowerDistributionError::BadPowerValue(_))
        ));
        assert!(matches!(
            PowerDistribution::Equal.values(0),
            Err(PowerDistributionError::ZeroMinersGiven)
        ));
        assert!(matches!(
            PowerDistribution::SetMiner(MinerId::from(3), 0.5).values(2),
            Err(PowerDistributionError::SetMinerBadMinerId(_))
        ));
    }

    #[test]
    fn single_miner_holds_everything() {
        assert_eq!(PowerDistribution::Equal.values(1).unwrap(), vec![1.0]);
    }
}
