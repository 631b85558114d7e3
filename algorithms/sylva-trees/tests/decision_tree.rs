use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sylva::prelude::*;
use sylva_trees::{
    AttributeValues, DecisionTree, NodeIndex, SplitKind, TreeData, TreeDataBuilder, Value,
};

fn random_table(nrows: usize, missing_share: f64, seed: u64) -> Result<DataTable> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut table = DataTable::new(vec![
        ColumnSpec::numeric("x1"),
        ColumnSpec::numeric("x2"),
        ColumnSpec::nominal("color"),
        ColumnSpec::new("bits", ColumnType::BitVector),
        ColumnSpec::nominal("class"),
    ]);
    let colors = ["red", "green", "blue", "white"];

    for i in 0..nrows {
        let x1: f64 = rng.gen_range(0.0..10.0);
        let x2: f64 = rng.gen_range(-1.0..1.0);
        let color = colors[rng.gen_range(0..colors.len())];
        let bits: Vec<bool> = (0..3).map(|_| rng.gen_bool(0.5)).collect();
        let class = if x1 + 3.0 * x2 > 5.0 || (color == "red" && bits[0]) {
            "yes"
        } else {
            "no"
        };

        let x2 = if rng.gen_bool(missing_share) {
            Cell::Missing
        } else {
            Cell::Numeric(x2)
        };
        table.push_row(
            format!("Row{}", i),
            vec![
                Cell::Numeric(x1),
                x2,
                color.into(),
                Cell::BitVector(bits),
                class.into(),
            ],
        )?;
    }
    Ok(table)
}

fn gini(counts: &[f64]) -> f64 {
    let n: f64 = counts.iter().sum();
    if n == 0.0 {
        0.0
    } else {
        n - counts.iter().map(|c| c * c).sum::<f64>() / n
    }
}

#[test]
fn numeric_threshold_is_optimal() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut table = DataTable::new(vec![ColumnSpec::numeric("x"), ColumnSpec::nominal("class")]);
    let mut rows = Vec::new();
    for i in 0..60 {
        // few distinct values, so that ties matter
        let x = rng.gen_range(0..15) as f64;
        let class = if rng.gen_bool(0.2 + 0.04 * x) { 1 } else { 0 };
        rows.push((x, class));
        table.push_row(
            format!("r{}", i),
            vec![Cell::Numeric(x), if class == 1 { "b" } else { "a" }.into()],
        )?;
    }
    let data = TreeDataBuilder::new("class").build(&table)?;
    let class_of = |c: usize| data.schema().classes()[c].as_str();

    let tree = DecisionTree::params().max_depth(Some(1)).fit(&data)?;
    let split = tree.root_node().split().expect("root is split");

    // every threshold between two distinct values
    let mut values: Vec<f64> = rows.iter().map(|r| r.0).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    values.dedup();
    let class_id = |label: usize| {
        let label = if label == 1 { "b" } else { "a" };
        (0..2).find(|&c| class_of(c) == label).unwrap()
    };
    let mut parent = [0.0; 2];
    rows.iter().for_each(|r| parent[class_id(r.1)] += 1.0);

    let best = values
        .windows(2)
        .map(|w| {
            let mut left = [0.0; 2];
            rows.iter()
                .filter(|r| r.0 <= w[0])
                .for_each(|r| left[class_id(r.1)] += 1.0);
            let right = [parent[0] - left[0], parent[1] - left[1]];
            gini(&parent) - gini(&left) - gini(&right)
        })
        .fold(f64::MIN, f64::max);

    assert!((split.gain() - best).abs() < 1e-9);
    match split.kind() {
        SplitKind::Numeric { threshold } => {
            assert!(values.iter().any(|v| v < threshold) && values.iter().any(|v| v > threshold))
        }
        kind => panic!("unexpected split {:?}", kind),
    }
    Ok(())
}

#[test]
fn leaves_partition_the_sample() -> Result<()> {
    let table = random_table(300, 0.2, 1)?;
    let data = TreeDataBuilder::new("class").build(&table)?;
    let params = DecisionTree::params()
        .attribute_sample_size(AttributeSampleSize::Sqrt)
        .check()?;

    for seed in 0..5 {
        let sample = RowSample::create(data.nrows(), 1.0, true, seed)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let tree = params.grow(&data, &sample, &mut rng, &CancelToken::new())?;

        let mut covered = vec![0; data.nrows()];
        for (index, node) in tree.nodes().iter().enumerate() {
            for &row in node.rows().unwrap_or(&[]) {
                covered[row] += 1;
                // training rows are routed to the leaf that holds them
                assert_eq!(tree.leaf_index(&data.row(row)), NodeIndex(index));
            }
        }
        for row in 0..data.nrows() {
            let expected = if sample.is_in_bag(row) { 1 } else { 0 };
            assert_eq!(covered[row], expected, "row {}", row);
        }

        let weight: f64 = tree
            .nodes()
            .iter()
            .filter(|node| node.is_leaf())
            .map(|node| node.stats().weight())
            .sum();
        assert_eq!(weight, sample.len() as f64);
    }
    Ok(())
}

#[test]
fn absent_and_missing_attributes_route_alike() -> Result<()> {
    let table = random_table(200, 0.3, 2)?;
    let data = TreeDataBuilder::new("class").build(&table)?;
    let tree = DecisionTree::params().fit(&data)?;

    // the same rows without the x2 column
    let mut without_x2 = DataTable::new(
        table
            .columns()
            .iter()
            .filter(|c| c.name() != "x2")
            .cloned()
            .collect(),
    );
    // and with every x2 value missing
    let mut missing_x2 = DataTable::new(table.columns().to_vec());
    for row in 0..table.nrows() {
        let mut cells = table.row(row).to_vec();
        cells[1] = Cell::Missing;
        missing_x2.push_row(table.row_key(row), cells.clone())?;
        cells.remove(1);
        without_x2.push_row(table.row_key(row), cells)?;
    }

    let absent = tree.predict(&without_x2)?;
    let missing = tree.predict(&missing_x2)?;
    assert_eq!(absent, missing);
    assert_eq!(missing, tree.predict(&missing_x2)?);

    let x2 = data.schema().attribute_index("x2").unwrap();
    for row in 0..table.nrows() {
        let record = data.schema().record(
            table.row_key(row),
            table
                .columns()
                .iter()
                .map(|c| c.name())
                .zip(table.row(row))
                .filter(|(name, _)| *name != "x2"),
        )?;
        assert_eq!(record.value(x2), Value::Missing);
        let leaf = tree.leaf_index(&record);
        assert!(tree.node(leaf).is_leaf());
    }
    Ok(())
}

#[test]
fn vector_positions_become_attributes() -> Result<()> {
    let table = random_table(100, 0.0, 3)?;
    let data: TreeData = TreeDataBuilder::new("class").build(&table)?;

    let names: Vec<&str> = data.schema().attributes().iter().map(|a| a.name()).collect();
    assert_eq!(
        names,
        vec!["x1", "x2", "color", "bits[0]", "bits[1]", "bits[2]"]
    );

    let tree = DecisionTree::params().fit(&data)?;
    let accuracy = tree
        .predict(&table)?
        .iter()
        .enumerate()
        .filter(|(row, p)| *p == table.cell(*row, 4))
        .count() as f64
        / table.nrows() as f64;
    assert!(accuracy > 0.9);
    Ok(())
}

/// Rows of a single nominal attribute with `k` categories, every category with its own target
/// distribution. The target is a class (0 or 1) or a number.
fn nominal_rows(seed: u64, k: usize, regression: bool) -> Result<(DataTable, Vec<(usize, f64)>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let effects: Vec<f64> = (0..k).map(|_| rng.gen_range(0.0..1.0)).collect();
    let mut table = DataTable::new(vec![
        ColumnSpec::nominal("category"),
        if regression {
            ColumnSpec::numeric("target")
        } else {
            ColumnSpec::nominal("target")
        },
    ]);

    let mut rows = Vec::new();
    for i in 0..60 {
        let category = rng.gen_range(0..k);
        let target = if regression {
            10.0 * effects[category] + rng.gen_range(-1.0..1.0)
        } else if rng.gen_bool(effects[category]) {
            1.0
        } else {
            0.0
        };
        let target_cell = if regression {
            Cell::Numeric(target)
        } else {
            Cell::from(if target > 0.5 { "one" } else { "zero" })
        };
        table.push_row(
            format!("r{}", i),
            vec![Cell::from(format!("c{}", category)), target_cell],
        )?;
        rows.push((category, target));
    }
    Ok((table, rows))
}

/// Impurity of a set of rows: weighted Gini of the two classes or the sum of squared errors
fn impurity<'a>(targets: impl Iterator<Item = &'a f64>, regression: bool) -> f64 {
    let targets: Vec<f64> = targets.copied().collect();
    if targets.is_empty() {
        return 0.0;
    }
    if regression {
        let mean = targets.iter().sum::<f64>() / targets.len() as f64;
        targets.iter().map(|y| (y - mean) * (y - mean)).sum()
    } else {
        let ones = targets.iter().filter(|&&y| y > 0.5).count() as f64;
        gini(&[targets.len() as f64 - ones, ones])
    }
}

/// Gain of sending the categories in `left` to one child and the rest to the other
fn partition_gain(rows: &[(usize, f64)], left: impl Fn(usize) -> bool, regression: bool) -> f64 {
    let parent = impurity(rows.iter().map(|r| &r.1), regression);
    let left_impurity = impurity(rows.iter().filter(|r| left(r.0)).map(|r| &r.1), regression);
    let right_impurity = impurity(rows.iter().filter(|r| !left(r.0)).map(|r| &r.1), regression);
    parent - left_impurity - right_impurity
}

fn check_nominal_split(seed: u64, regression: bool, binary: bool) -> Result<()> {
    let k = 5;
    let (table, rows) = nominal_rows(seed, k, regression)?;
    let data = TreeDataBuilder::new("target").build(&table)?;
    let tree = DecisionTree::params()
        .max_depth(Some(1))
        .use_binary_nominal_splits(binary)
        .fit(&data)?;

    let present: Vec<usize> = (0..k).filter(|&c| rows.iter().any(|r| r.0 == c)).collect();
    let best = if binary {
        // every subset of the present categories
        (1..(1usize << present.len()) - 1)
            .map(|subset| {
                partition_gain(
                    &rows,
                    |c| {
                        let position = present.iter().position(|&p| p == c).unwrap_or(0);
                        subset & (1 << position) != 0
                    },
                    regression,
                )
            })
            .fold(f64::MIN, f64::max)
    } else {
        present
            .iter()
            .map(|&single| partition_gain(&rows, |c| c == single, regression))
            .fold(f64::MIN, f64::max)
    };

    match tree.root_node().split() {
        Some(split) => {
            assert!(
                (split.gain() - best).abs() < 1e-9 * (1.0 + best.abs()),
                "seed {}: gain {} but the best partition gains {}",
                seed,
                split.gain(),
                best
            );
            match split.kind() {
                SplitKind::Nominal { left, right } => {
                    assert_eq!(left.count_ones() + right.count_ones(), present.len());
                    if !binary {
                        assert_eq!(left.count_ones(), 1);
                    }
                }
                kind => panic!("unexpected split {:?}", kind),
            }
        }
        None => assert!(best < 1e-9, "seed {}: no split but {} is possible", seed, best),
    }
    Ok(())
}

#[test]
fn two_class_nominal_partition_is_optimal() -> Result<()> {
    for seed in 0..40 {
        check_nominal_split(seed, false, true)?;
    }
    Ok(())
}

#[test]
fn regression_nominal_partition_is_optimal() -> Result<()> {
    for seed in 0..40 {
        check_nominal_split(seed, true, true)?;
    }
    Ok(())
}

#[test]
fn one_versus_rest_splits_pick_the_best_category() -> Result<()> {
    for seed in 0..20 {
        check_nominal_split(seed, false, false)?;
        check_nominal_split(seed, true, false)?;
    }
    Ok(())
}
