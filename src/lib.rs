/*!
Simulator for rational mining under Expected Consensus leader election.

Each trial runs a fixed number of rounds. Every round, the blocks published in
the previous round are grouped into tipsets, and each miner considers every
fork of those tipsets it has not yet given up on. A miner wins the round's
lottery on a fork if the ticket it draws, sampled `lookback` tipsets back from
that fork, falls under its share of mining power. Rational miners publish a
single block on the winning fork with the greatest parent weight, and keep a
private chain of null blocks on every fork they lose.

Trials are run through a [`SimulationGroup`](simulation::SimulationGroup),
configured with a [`SimulationBuilder`](simulation::SimulationBuilder):

```
use ec_sim::prelude::*;

let results = SimulationBuilder::new()
    .lookback(10)
    .miners(10)
    .rounds(50)
    .trials(2)
    .build()
    .unwrap()
    .run_all()
    .unwrap();

assert_eq!(results.outputs().len(), 2);
```
*/

pub mod block;
pub mod chain;
pub mod export;
pub mod fork;
pub mod miner;
pub mod power_dist;
pub mod prelude;
pub mod results;
pub mod simulation;
pub mod ticket;
pub mod tipset;

pub(crate) mod utils;
