//! CSV export of mined records in the fixed external schema.

use std::io::Write;

use crate::error::Result;
use crate::record::MineRecord;

const HEADER: &str = "seed,seed_hex,score,objective_score,day,population,happiness,money,avg_land_value,\
traffic_congestion,goods_satisfaction,services_overall_satisfaction,roads,parks,road_tiles,water_tiles,\
res_tiles,com_tiles,ind_tiles,park_tiles,sea_flood_frac,sea_max_depth,pond_frac,pond_max_depth,pond_volume,\
overlay_phash,pareto_rank,pareto_crowding,outlier_lof,novelty";

fn f6(v: f64) -> String {
    format!("{v:.6}")
}

fn record_row(record: &MineRecord) -> String {
    format!(
        "{seed},0x{seed:016x},{score},{objective_score},{day},{population},{happiness},{money},{avg_land_value},\
{traffic_congestion},{goods_satisfaction},{services_overall_satisfaction},{roads},{parks},{road_tiles},\
{water_tiles},{res_tiles},{com_tiles},{ind_tiles},{park_tiles},{sea_flood_frac},{sea_max_depth},{pond_frac},\
{pond_max_depth},{pond_volume},0x{overlay_phash:016x},{pareto_rank},{pareto_crowding},{outlier_lof},{novelty}",
        seed = record.seed,
        score = f6(record.score),
        objective_score = f6(record.objective_score),
        day = record.stats.day,
        population = record.stats.population,
        happiness = f6(f64::from(record.stats.happiness)),
        money = f6(record.stats.money),
        avg_land_value = f6(f64::from(record.stats.avg_land_value)),
        traffic_congestion = f6(f64::from(record.stats.traffic_congestion)),
        goods_satisfaction = f6(f64::from(record.stats.goods_satisfaction)),
        services_overall_satisfaction = f6(f64::from(record.stats.services_overall_satisfaction)),
        roads = record.road_tiles,
        parks = record.park_tiles,
        road_tiles = record.road_tiles,
        water_tiles = record.water_tiles,
        res_tiles = record.res_tiles,
        com_tiles = record.com_tiles,
        ind_tiles = record.ind_tiles,
        park_tiles = record.park_tiles,
        sea_flood_frac = f6(record.sea_flood_frac),
        sea_max_depth = f6(record.sea_max_depth),
        pond_frac = f6(record.pond_frac),
        pond_max_depth = f6(record.pond_max_depth),
        pond_volume = f6(record.pond_volume),
        overlay_phash = record.overlay_phash,
        pareto_rank = record.pareto_rank,
        pareto_crowding = f6(record.pareto_crowding),
        outlier_lof = f6(record.outlier_lof),
        novelty = f6(record.novelty),
    )
}

/// Writes `records` as CSV to `writer`: one header row, then one row per
/// record in the fixed external column order.
///
/// # Errors
/// Propagates any I/O failure from `writer`.
pub fn write_records_csv<W: Write>(writer: &mut W, records: &[MineRecord]) -> Result<()> {
    writeln!(writer, "{HEADER}")?;
    for record in records {
        writeln!(writer, "{}", record_row(record))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_has_thirty_columns() {
        assert_eq!(HEADER.split(',').count(), 30);
    }

    #[test]
    fn writes_one_row_per_record_with_fixed_precision() {
        let mut records = vec![MineRecord::default(); 2];
        records[0].seed = 0x1234_5678_9abc_def0;
        records[0].score = 1.0 / 3.0;
        records[0].overlay_phash = 0xdead_beef_0000_0001;

        let mut buf = Vec::new();
        write_records_csv(&mut buf, &records).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER));
        let first_row = lines.next().unwrap();
        assert!(first_row.starts_with("1311768467463790320,0x123456789abcdef0,0.333333,"));
        assert!(first_row.contains("0xdeadbeef00000001"));
        assert_eq!(lines.count(), 1);
    }
}
