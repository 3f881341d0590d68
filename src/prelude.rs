/*!
Re-export of common values and datatypes used for running and analyzing
simulations. Must be imported manually.

```
use ec_sim::prelude::*;
```
*/

use crate::{
    block, chain, export, fork, miner, power_dist, results, simulation, ticket,
    tipset,
};

pub use block::{Block, BlockId, BlockIdAllocator};

pub use chain::ChainTracker;

pub use export::{export_trial, ExportError, ExportFormats};

pub use fork::{enumerate_forks, forks_of, group_into_tipsets};

pub use miner::{Action, MinerId, MiningContext, RationalMiner};

pub use power_dist::{PowerDistribution, PowerDistributionError, PowerValue};

pub use results::{Average, Format, ResultsBuilder, ResultsTable};

pub use simulation::{
    SimulationBuildError, SimulationBuilder, SimulationError, SimulationGroup,
    Trial, TrialConfig, TrialOutput,
};

pub use ticket::{Ticket, TicketGenerator, TicketKind, TICKET_SPACE};

pub use tipset::{Tipset, TipsetError, TipsetKey};
