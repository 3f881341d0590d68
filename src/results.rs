/*!
Control the appearance of simulation result data

# Working with [`ResultsBuilder`]

## Examples

Creating a [`ResultsTable`] after running a simulation group:

```
use ec_sim::prelude::*;

let sim = SimulationBuilder::new()
    .lookback_iter([1, 3])
    .miners(5)
    .rounds(20)
    .trials(3)
    .build()
    .unwrap();

let results = sim
    .run_all()
    .unwrap()
    .average(Average::Mean) // Average the repeated trials of each configuration
    .live_forks()           // Include the average number of live forks per round
    .head_weight()          // Include the weight of the final head
    .format(Format::CSV)    // Output results as CSV
    .build();

println!("{}", results);
```
*/

use std::{collections::BTreeSet, fmt::Display, num::NonZeroUsize};

use crate::simulation::TrialOutput;

/// Floating point precision of results data.
pub const FLOAT_PRECISION_DIGITS: usize = 6;

/// Builder for [`ResultsTable`]. Produced by running a
/// [`SimulationGroup`](crate::simulation::SimulationGroup).
#[derive(Debug, Clone)]
pub struct ResultsBuilder {
    average: Average,
    columns: BTreeSet<Column>,
    data: Vec<TrialOutput>,
    format: Format,
    repeated: NonZeroUsize,
}

/// Describes the appearance of a [`ResultsTable`] table as given by its
/// [`Display`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    /// Comma-separated, without extra whitespace.
    CSV,
    /// Human-readable.
    #[default]
    PrettyPrint,
}

impl ResultsBuilder {
    /// Create a new [`ResultsBuilder`]. `data` holds `repeated` consecutive
    /// trials of each configuration.
    pub(crate) fn new(data: Vec<TrialOutput>, repeated: NonZeroUsize) -> Self {
        Self {
            data,
            repeated,
            average: Average::default(),
            columns: BTreeSet::default(),
            format: Format::default(),
        }
    }

    /// Include every data column.
    ///
    /// [`ResultsBuilder::average`] must still be called separately
    /// to create averaged data.
    pub fn all(self) -> Self {
        self.live_forks()
            .head_weight()
            .head_height()
            .live_blocks()
            .null_blocks()
            .rounds()
    }

    /// Average the results of repeated trials based on the given
    /// [`Average`] type. For types other than [`Average::None`], a column
    /// describing the averaging method will be included in the results table.
    pub fn average(mut self, average: Average) -> Self {
        self.average = average;

        self
    }

    /// Raw output of every trial.
    ///
    /// # Ordering
    /// Trials of a configuration are grouped together, and configurations
    /// follow the order given to the
    /// [`SimulationBuilder`](crate::simulation::SimulationBuilder).
    pub fn outputs(&self) -> &[TrialOutput] {
        &self.data
    }

    /// Extract the raw [`TrialOutput`] data from this [`ResultsBuilder`].
    /// Useful for running custom statistical analysis.
    pub fn data(self) -> Vec<TrialOutput> {
        self.data
    }

    /// Include the "Live Forks Per Round" column in the results table.
    pub fn live_forks(mut self) -> Self {
        self.columns.insert(Column::LiveForksPerRound);

        self
    }

    /// Include the "Head Weight" column in the results table.
    pub fn head_weight(mut self) -> Self {
        self.columns.insert(Column::HeadWeight);

        self
    }

    /// Include the "Head Height" column in the results table.
    pub fn head_height(mut self) -> Self {
        self.columns.insert(Column::HeadHeight);

        self
    }

    /// Include the "Live Blocks" column in the results table.
    pub fn live_blocks(mut self) -> Self {
        self.columns.insert(Column::LiveBlocks);

        self
    }

    /// Include the "Null Blocks" column in the results table.
    pub fn null_blocks(mut self) -> Self {
        self.columns.insert(Column::NullBlocks);

        self
    }

    /// Include the "Simulated Rounds" column in the results table.
    pub fn rounds(mut self) -> Self {
        self.columns.insert(Column::Rounds);

        self
    }

    /// Specify the [`Format`] of the results table.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;

        self
    }

    /// Create new [`ResultsTable`].
    pub fn build(self) -> ResultsTable {
        let ResultsBuilder { average, mut columns, data, format, repeated } =
            self;

        columns.insert(Column::Lookback);
        columns.insert(Column::Miners);
        if average != Average::None {
            columns.insert(Column::AverageOf(average));
        }

        let columns = Vec::from_iter(columns);
        let rows = match average {
            Average::None => data
                .iter()
                .map(|output| {
                    columns.iter().map(|col| col.get_value(output)).collect()
                })
                .collect(),
            _ => data
                .chunks(repeated.get())
                .map(|outputs| {
                    columns
                        .iter()
                        .map(|col| col.get_average_value(average, outputs))
                        .collect()
                })
                .collect(),
        };

        ResultsTable { columns, format, rows }
    }
}

/// Formatted results from the completion of a
/// [`SimulationGroup`](crate::simulation::SimulationGroup). The results table
/// is given by the struct's [`Display`] implementation, as specified by
/// its [`Format`].
pub struct ResultsTable {
    columns: Vec<Column>,
    format: Format,
    rows: Vec<Vec<ColumnValue>>,
}

impl ResultsTable {
    const SEPARATOR_VERTICAL: char = '|';
    const SEPARATOR_HORIZONTAL: char = '-';

    pub fn format(&self) -> Format {
        self.format
    }

    /// Number of data rows in the table.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl Display for ResultsTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let titles: Vec<_> =
            self.columns.iter().map(|col| col.to_string()).collect();

        match self.format {
            Format::CSV => {
                write!(f, "{}", titles.join(","))?;

                for row in self.rows.iter() {
                    writeln!(f)?;

                    let row: Vec<_> =
                        row.iter().map(|val| val.to_string()).collect();

                    write!(f, "{}", row.join(","))?;
                }
            }
            Format::PrettyPrint => {
                let mut text_widths: Vec<_> =
                    titles.iter().map(|title| title.len()).collect();

                for row in self.rows.iter() {
                    for (i, val) in row.iter().enumerate() {
                        text_widths[i] = text_widths[i].max(val.to_string().len());
                    }
                }

                for (i, title) in titles.into_iter().enumerate() {
                    write!(
                        f,
                        " {:1$} {2}",
                        title,
                        text_widths[i],
                        Self::SEPARATOR_VERTICAL
                    )?;
                }
                writeln!(f)?;

                let total_width = text_widths.iter().map(|x| x + 3).sum();
                for _ in 0..total_width {
                    write!(f, "{}", Self::SEPARATOR_HORIZONTAL)?;
                }

                for row in self.rows.iter() {
                    writeln!(f)?;

                    for (i, val) in row.iter().enumerate() {
                        write!(
                            f,
                            " {:1$} {2}",
                            val.to_string(),
                            text_widths[i],
                            Self::SEPARATOR_VERTICAL
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Methods of extracting an average/central value from a set of repeated
/// trials.
///
/// Only applied to the values of columns which vary between trials.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Average {
    #[default]
    /// Include all repeated values.
    None,
    /// Arithmetic mean of all values.
    Mean,
    /// Median of all values.
    Median,
    /// Maximum of all values.
    Max,
    /// Minimum of all values.
    Min,
}

/// Type of column that can appear in a data table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Column {
    // Variant order determines the order of columns in results tables
    Lookback,
    Miners,
    Rounds,
    AverageOf(Average),
    LiveForksPerRound,
    HeadWeight,
    HeadHeight,
    LiveBlocks,
    NullBlocks,
}

/// Value which corresponds to a [`Column`].
#[derive(Debug, Clone, Copy)]
enum ColumnValue {
    Int(usize),
    Float(f64),
}

impl Column {
    /// Whether the column's value varies between trials of one
    /// configuration.
    fn is_measured(&self) -> bool {
        !matches!(
            self,
            Self::Lookback | Self::Miners | Self::Rounds | Self::AverageOf(_)
        )
    }

    fn measure(&self, output: &TrialOutput) -> f64 {
        let chain = &output.chain;
        match &self {
            Self::LiveForksPerRound => chain.average_live_forks_per_round(),
            Self::HeadWeight => chain.head().weight() as f64,
            Self::HeadHeight => chain.head().height() as f64,
            Self::LiveBlocks => chain.num_live_blocks() as f64,
            Self::NullBlocks => chain.num_null_blocks() as f64,
            _ => unreachable!("{} is not a measured column", self),
        }
    }

    fn get_value(&self, output: &TrialOutput) -> ColumnValue {
        match &self {
            Self::Lookback => ColumnValue::Int(output.config.lookback.get()),
            Self::Miners => ColumnValue::Int(output.config.num_miners()),
            Self::Rounds => ColumnValue::Int(output.config.rounds.get()),
            Self::AverageOf(_) => ColumnValue::Int(1),
            _ => ColumnValue::Float(self.measure(output)),
        }
    }

    fn get_average_value(
        &self,
        method: Average,
        data: &[TrialOutput],
    ) -> ColumnValue {
        if let Self::AverageOf(_) = self {
            return ColumnValue::Int(data.len());
        }
        if !self.is_measured() {
            return self.get_value(&data[0]);
        }

        let vls: Vec<_> = data.iter().map(|output| self.measure(output)).collect();
        let avg = match method {
            Average::Mean => vls.iter().sum::<f64>() / vls.len() as f64,
            Average::Median => crate::utils::median_of_floats(vls),
            Average::Max => vls.into_iter().fold(f64::NEG_INFINITY, f64::max),
            Average::Min => vls.into_iter().fold(f64::INFINITY, f64::min),
            Average::None => unreachable!(),
        };

        ColumnValue::Float(avg)
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::AverageOf(method) => match method {
                Average::Mean => write!(f, "Mean Of"),
                Average::Median => write!(f, "Median Of"),
                Average::Max => write!(f, "Max Of"),
                Average::Min => write!(f, "Min Of"),
                Average::None => write!(f, "Trials"),
            },
            Self::Lookback => write!(f, "Lookback"),
            Self::Miners => write!(f, "Miners"),
            Self::Rounds => write!(f, "Simulated Rounds"),
            Self::LiveForksPerRound => write!(f, "Live Forks Per Round"),
            Self::HeadWeight => write!(f, "Head Weight"),
            Self::HeadHeight => write!(f, "Head Height"),
            Self::LiveBlocks => write!(f, "Live Blocks"),
            Self::NullBlocks => write!(f, "Null Blocks"),
        }
    }
}

impl Display for ColumnValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Float(value) => {
                write!(f, "{:.1$}", value, FLOAT_PRECISION_DIGITS)
            }
        }
    }
}
