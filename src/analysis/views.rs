//! The five dashboard views.
//!
//! Each function filters the canonical table, groups, sums and returns a
//! freshly built derived table. None of them touch the source records.

use super::aggregator::{mean, min_max, mixes_aggregates, sum_by};
use crate::data::Dataset;
use crate::models::{
    AgeSexBar, AgeSexView, ComparisonBar, ComparisonView, CountryYearTotal, MortalityRecord,
    RegionBar, RegionBarView, SeriesType, Sex, TotalsPolicy, TrendSeries, TrendView,
    WorldMapView, YearValue, AGE_GROUP_ALL, AGE_GROUP_UNKNOWN,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, warn};

/// Display order of age buckets in the age/sex breakdown.
pub const AGE_ORDER: [&str; 19] = [
    "0", "1-4", "5-9", "10-14", "15-19", "20-24", "25-29", "30-34", "35-39", "40-44", "45-49",
    "50-54", "55-59", "60-64", "65-69", "70-74", "75-79", "80-84", "85+",
];

/// Sexes compared side by side in the multi-country view.
const COMPARISON_SEXES: [Sex; 3] = [Sex::All, Sex::Female, Sex::Male];

fn warn_double_count(view: &str) {
    warn!(
        "{} totals include rows that are themselves totals (Sex=All or Age Group={}); \
         values are double counted. Use --totals-policy exclude-aggregates to skip them.",
        view, AGE_GROUP_ALL
    );
}

/// Country totals for one year, with the map's color domain.
pub fn world_map(dataset: &Dataset, year: i32, policy: TotalsPolicy) -> WorldMapView {
    let rows: Vec<&MortalityRecord> = dataset
        .records()
        .iter()
        .filter(|r| r.year == year && policy.includes(r))
        .collect();

    let double_counted = policy == TotalsPolicy::AllRows
        && mixes_aggregates(rows.iter().copied(), |r| r.country.as_str(), true);
    if double_counted {
        warn_double_count("World map");
    }

    let mut totals: BTreeMap<(&str, Option<&str>), (f64, f64)> = BTreeMap::new();
    for r in &rows {
        let entry = totals
            .entry((r.country.as_str(), r.country_code.as_deref()))
            .or_insert((0.0, 0.0));
        entry.0 += r.number;
        entry.1 += r.death_rate;
    }

    let rows: Vec<CountryYearTotal> = totals
        .into_iter()
        .map(|((country, code), (deaths, rate))| CountryYearTotal {
            country: country.to_string(),
            year,
            country_code: code.map(String::from),
            total_deaths: deaths,
            total_death_rate: rate,
        })
        .collect();

    let color_domain = min_max(rows.iter().map(|r| r.total_deaths));
    let unplottable: Vec<String> = rows
        .iter()
        .filter(|r| r.country_code.is_none())
        .map(|r| r.country.clone())
        .collect();

    debug!(
        "World map {}: {} countries, domain {:?}",
        year,
        rows.len(),
        color_domain
    );

    WorldMapView {
        year,
        rows,
        color_domain,
        unplottable,
        double_counted,
    }
}

/// Country totals inside one region and year, largest first.
///
/// A bar is highlighted when its country name equals `selected_country`.
pub fn region_bars(
    dataset: &Dataset,
    region: &str,
    year: i32,
    selected_country: Option<&str>,
    policy: TotalsPolicy,
) -> RegionBarView {
    let rows: Vec<&MortalityRecord> = dataset
        .records()
        .iter()
        .filter(|r| r.region == region && r.year == year && policy.includes(r))
        .collect();

    let double_counted = policy == TotalsPolicy::AllRows
        && mixes_aggregates(rows.iter().copied(), |r| r.country.as_str(), true);
    if double_counted {
        warn_double_count("Region");
    }

    let mut bars: Vec<RegionBar> = sum_by(rows.iter().copied(), |r| r.country.as_str(), |r| r.number)
        .into_iter()
        .map(|(country, number)| RegionBar {
            highlighted: selected_country == Some(country),
            country: country.to_string(),
            number,
        })
        .collect();

    bars.sort_by(|a, b| {
        b.number
            .total_cmp(&a.number)
            .then_with(|| a.country.cmp(&b.country))
    });

    debug!("Region {} in {}: {} countries", region, year, bars.len());

    RegionBarView {
        region: region.to_string(),
        year,
        selected_country: selected_country.map(String::from),
        bars,
        double_counted,
    }
}

fn yearly_series<'a, I>(series_type: SeriesType, rows: I) -> TrendSeries
where
    I: IntoIterator<Item = &'a MortalityRecord>,
{
    let points = sum_by(rows, |r| r.year, |r| r.number)
        .into_iter()
        .map(|(year, number)| YearValue { year, number })
        .collect();
    TrendSeries {
        series_type,
        points,
    }
}

/// Mean over countries of each country's yearly total.
fn cross_country_average(dataset: &Dataset, policy: TotalsPolicy) -> TrendSeries {
    let per_country = sum_by(
        dataset.records().iter().filter(|r| policy.includes(r)),
        |r| (r.year, r.country.as_str()),
        |r| r.number,
    );

    let mut by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for ((year, _), total) in per_country {
        by_year.entry(year).or_default().push(total);
    }

    let points = by_year
        .into_iter()
        .filter_map(|(year, totals)| Some(YearValue { year, number: mean(&totals)? }))
        .collect();

    TrendSeries {
        series_type: SeriesType::Average,
        points,
    }
}

/// Yearly mortality series for one country plus the cross-country average.
///
/// Returns `None` when the country has no rows at all.
pub fn trend(dataset: &Dataset, country: &str, policy: TotalsPolicy) -> Option<TrendView> {
    let rows: Vec<&MortalityRecord> = dataset
        .records()
        .iter()
        .filter(|r| r.country == country)
        .collect();
    if rows.is_empty() {
        return None;
    }

    // Series are already split by sex, so only the age total can overlap.
    let split_rows: Vec<&MortalityRecord> = rows
        .iter()
        .copied()
        .filter(|r| policy == TotalsPolicy::AllRows || r.age_group != AGE_GROUP_ALL)
        .collect();
    let of_sex = |sex: Sex| {
        let series_type = match sex {
            Sex::All => SeriesType::All,
            Sex::Female => SeriesType::Female,
            Sex::Male => SeriesType::Male,
            _ => SeriesType::Unknown,
        };
        yearly_series(
            series_type,
            split_rows.iter().copied().filter(move |r| r.sex == sex),
        )
    };
    let present = |sex: &Sex| rows.iter().any(|r| &r.sex == sex);

    let double_counted = policy == TotalsPolicy::AllRows
        && (mixes_aggregates(split_rows.iter().copied(), |r| (r.year, r.sex.to_string()), false)
            || mixes_aggregates(
                dataset.records(),
                |r| (r.year, r.country.as_str()),
                true,
            ));
    if double_counted {
        warn_double_count("Trend");
    }

    let view = TrendView {
        country: country.to_string(),
        all: present(&Sex::All).then(|| of_sex(Sex::All)),
        female: of_sex(Sex::Female),
        male: of_sex(Sex::Male),
        unknown: present(&Sex::Unknown).then(|| of_sex(Sex::Unknown)),
        average: cross_country_average(dataset, policy),
        double_counted,
    };

    debug!("Trend for {}: {} series", country, view.series().len());
    Some(view)
}

/// Age-group label without bracket characters.
pub fn strip_age_brackets(label: &str) -> String {
    label.chars().filter(|c| *c != '[' && *c != ']').collect()
}

/// Position of a stripped age label; labels outside [`AGE_ORDER`] sort last.
pub fn age_rank(label: &str) -> usize {
    AGE_ORDER
        .iter()
        .position(|a| *a == label)
        .unwrap_or(AGE_ORDER.len())
}

/// Deaths per age group and sex for one country and year.
///
/// The `[Unknown]` and `[All]` age groups are left out. Returns `None` when
/// nothing remains.
pub fn age_sex(dataset: &Dataset, country: &str, year: i32) -> Option<AgeSexView> {
    let rows = dataset.records().iter().filter(|r| {
        r.country == country
            && r.year == year
            && r.age_group != AGE_GROUP_UNKNOWN
            && r.age_group != AGE_GROUP_ALL
    });

    let sums = sum_by(
        rows,
        |r| (strip_age_brackets(&r.age_group), r.sex.to_string()),
        |r| r.number,
    );
    if sums.is_empty() {
        return None;
    }

    let mut bars: Vec<AgeSexBar> = sums
        .into_iter()
        .map(|((age_group, sex), number)| AgeSexBar {
            age_group,
            sex: Sex::from(sex.as_str()),
            number,
        })
        .collect();

    bars.sort_by(|a, b| {
        age_rank(&a.age_group)
            .cmp(&age_rank(&b.age_group))
            .then_with(|| a.age_group.cmp(&b.age_group))
            .then_with(|| a.sex.legend_rank().cmp(&b.sex.legend_rank()))
            .then_with(|| a.sex.to_string().cmp(&b.sex.to_string()))
    });

    Some(AgeSexView {
        country: country.to_string(),
        year,
        bars,
    })
}

/// Per-country sums split into All, Female and Male blocks for one year.
///
/// Blocks are already split by sex, so only the `[All]` age group can
/// overlap with the rows it covers; `policy` decides whether it is summed.
/// Returns `None` when the selected countries have no rows that year.
pub fn comparison(
    dataset: &Dataset,
    countries: &[String],
    year: i32,
    policy: TotalsPolicy,
) -> Option<ComparisonView> {
    let selected: HashSet<&str> = countries.iter().map(String::as_str).collect();
    let rows: Vec<&MortalityRecord> = dataset
        .records()
        .iter()
        .filter(|r| r.year == year && selected.contains(r.country.as_str()))
        .filter(|r| policy == TotalsPolicy::AllRows || r.age_group != AGE_GROUP_ALL)
        .collect();
    if rows.is_empty() {
        return None;
    }

    let double_counted = policy == TotalsPolicy::AllRows
        && mixes_aggregates(
            rows.iter().copied(),
            |r| (r.country.as_str(), r.sex.to_string()),
            false,
        );
    if double_counted {
        warn_double_count("Comparison");
    }

    let mut bars = Vec::new();
    for sex in COMPARISON_SEXES {
        let sums = sum_by(
            rows.iter().copied().filter(|r| r.sex == sex),
            |r| r.country.as_str(),
            |r| r.number,
        );
        bars.extend(sums.into_iter().map(|(country, number)| ComparisonBar {
            country: country.to_string(),
            gender: sex.clone(),
            number,
        }));
    }

    let countries: BTreeSet<String> = countries.iter().cloned().collect();
    debug!("Comparison {}: {} bars", year, bars.len());

    Some(ComparisonView {
        year,
        countries: countries.into_iter().collect(),
        bars,
        double_counted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        region: &str,
        country: &str,
        year: i32,
        sex: Sex,
        age_group: &str,
        number: f64,
    ) -> MortalityRecord {
        MortalityRecord {
            region: region.to_string(),
            country: country.to_string(),
            year,
            sex,
            age_group: age_group.to_string(),
            number,
            death_rate: number / 100.0,
            country_code: match country {
                "Finland" => Some("246".to_string()),
                "Canada" => Some("124".to_string()),
                _ => None,
            },
        }
    }

    fn sample() -> Dataset {
        Dataset::from_records(vec![
            record("Europe", "Finland", 2000, Sex::Male, "[0]", 10.0),
            record("Europe", "Finland", 2000, Sex::Female, "[0]", 20.0),
            record("Europe", "Finland", 2001, Sex::Male, "[1-4]", 5.0),
            record("Europe", "Sweden", 2000, Sex::Male, "[0]", 40.0),
            record("Americas", "Canada", 2000, Sex::All, "[85+]", 300.0),
            record("Americas", "Canada", 2000, Sex::Male, "[85+]", 100.0),
            record("Americas", "Canada", 2000, Sex::Female, "[0]", 200.0),
            record("Americas", "Canada", 2000, Sex::Male, "[Unknown]", 50.0),
            record("Americas", "Canada", 2001, Sex::Unknown, "[0]", 1.0),
        ])
    }

    #[test]
    fn test_world_map_sums_match_year_total() {
        let dataset = sample();
        let view = world_map(&dataset, 2000, TotalsPolicy::AllRows);

        let map_total: f64 = view.rows.iter().map(|r| r.total_deaths).sum();
        let year_total: f64 = dataset
            .records()
            .iter()
            .filter(|r| r.year == 2000)
            .map(|r| r.number)
            .sum();
        assert_eq!(map_total, year_total);
        assert_eq!(view.rows.len(), 3);
        assert_eq!(view.unplottable, vec!["Sweden".to_string()]);
    }

    #[test]
    fn test_world_map_domain_follows_year() {
        let dataset = sample();

        let view_2000 = world_map(&dataset, 2000, TotalsPolicy::AllRows);
        assert_eq!(view_2000.color_domain, Some((30.0, 650.0)));

        let view_2001 = world_map(&dataset, 2001, TotalsPolicy::AllRows);
        assert_eq!(view_2001.color_domain, Some((1.0, 5.0)));

        let empty = world_map(&dataset, 1990, TotalsPolicy::AllRows);
        assert!(empty.rows.is_empty());
        assert_eq!(empty.color_domain, None);
    }

    #[test]
    fn test_world_map_flags_double_count() {
        let dataset = sample();

        let all_rows = world_map(&dataset, 2000, TotalsPolicy::AllRows);
        assert!(all_rows.double_counted);

        let excluded = world_map(&dataset, 2000, TotalsPolicy::ExcludeAggregates);
        assert!(!excluded.double_counted);
        let canada = excluded.rows.iter().find(|r| r.country == "Canada").unwrap();
        assert_eq!(canada.total_deaths, 350.0);
    }

    #[test]
    fn test_region_bars_sorted_and_highlighted() {
        let dataset = sample();
        let view = region_bars(&dataset, "Europe", 2000, Some("Finland"), TotalsPolicy::AllRows);

        assert_eq!(view.bars.len(), 2);
        assert_eq!(view.bars[0].country, "Sweden");
        assert_eq!(view.bars[0].number, 40.0);
        assert!(!view.bars[0].highlighted);
        assert_eq!(view.bars[1].country, "Finland");
        assert_eq!(view.bars[1].number, 30.0);
        assert!(view.bars[1].highlighted);
        assert!(!view.double_counted);
    }

    #[test]
    fn test_region_bars_unknown_selection_highlights_nothing() {
        let dataset = sample();
        let view = region_bars(&dataset, "Europe", 2000, Some("Canada"), TotalsPolicy::AllRows);
        assert!(view.bars.iter().all(|b| !b.highlighted));
    }

    #[test]
    fn test_trend_series_count() {
        let dataset = sample();

        // Canada has All, Male, Female and Unknown rows: 4 + average.
        let canada = trend(&dataset, "Canada", TotalsPolicy::AllRows).unwrap();
        assert!(canada.all.is_some());
        assert!(canada.unknown.is_some());
        assert_eq!(canada.series().len(), 5);

        // Finland has only Male and Female: 2 + average.
        let finland = trend(&dataset, "Finland", TotalsPolicy::AllRows).unwrap();
        assert!(finland.all.is_none());
        assert!(finland.unknown.is_none());
        assert_eq!(finland.series().len(), 3);

        let kinds: BTreeSet<SeriesType> =
            finland.long_form().into_iter().map(|p| p.series_type).collect();
        assert_eq!(kinds.len(), 3);
    }

    #[test]
    fn test_trend_values() {
        let dataset = sample();
        let finland = trend(&dataset, "Finland", TotalsPolicy::AllRows).unwrap();

        assert_eq!(
            finland.male.points,
            vec![
                YearValue { year: 2000, number: 10.0 },
                YearValue { year: 2001, number: 5.0 },
            ]
        );
        // 2000: Finland 30, Sweden 40, Canada 650 → mean 240.
        assert_eq!(finland.average.points[0], YearValue { year: 2000, number: 240.0 });
        // 2001: Finland 5, Canada 1 → mean 3.
        assert_eq!(finland.average.points[1], YearValue { year: 2001, number: 3.0 });
    }

    #[test]
    fn test_trend_missing_country() {
        assert!(trend(&sample(), "Atlantis", TotalsPolicy::AllRows).is_none());
    }

    #[test]
    fn test_age_sex_excludes_sentinels() {
        let dataset = Dataset::from_records(vec![
            record("Americas", "Canada", 2000, Sex::Male, "0-4", 100.0),
            record("Americas", "Canada", 2000, Sex::Male, "[Unknown]", 50.0),
        ]);

        let view = age_sex(&dataset, "Canada", 2000).unwrap();

        assert_eq!(view.bars.len(), 1);
        assert_eq!(view.bars[0].number, 100.0);
        assert_eq!(view.bars[0].age_group, "0-4");
    }

    #[test]
    fn test_age_sex_ordering_and_brackets() {
        let dataset = Dataset::from_records(vec![
            record("Europe", "Finland", 2000, Sex::Female, "[85+]", 9.0),
            record("Europe", "Finland", 2000, Sex::Male, "[10-14]", 2.0),
            record("Europe", "Finland", 2000, Sex::Female, "[10-14]", 3.0),
            record("Europe", "Finland", 2000, Sex::Male, "[5-9]", 1.0),
            record("Europe", "Finland", 2000, Sex::All, "[All]", 15.0),
        ]);

        let view = age_sex(&dataset, "Finland", 2000).unwrap();
        let labels: Vec<(&str, String)> = view
            .bars
            .iter()
            .map(|b| (b.age_group.as_str(), b.sex.to_string()))
            .collect();

        assert_eq!(
            labels,
            vec![
                ("5-9", "Male".to_string()),
                ("10-14", "Male".to_string()),
                ("10-14", "Female".to_string()),
                ("85+", "Female".to_string()),
            ]
        );
        assert!(view
            .bars
            .iter()
            .all(|b| !b.age_group.contains('[') && !b.age_group.contains(']')));
    }

    #[test]
    fn test_age_sex_empty() {
        assert!(age_sex(&sample(), "Finland", 1990).is_none());
    }

    #[test]
    fn test_comparison_blocks() {
        let dataset = sample();
        let countries = vec!["Finland".to_string(), "Canada".to_string()];

        let view = comparison(&dataset, &countries, 2000, TotalsPolicy::AllRows).unwrap();

        let bars: Vec<(&str, Sex, f64)> = view
            .bars
            .iter()
            .map(|b| (b.country.as_str(), b.gender.clone(), b.number))
            .collect();
        assert_eq!(
            bars,
            vec![
                ("Canada", Sex::All, 300.0),
                ("Canada", Sex::Female, 200.0),
                ("Finland", Sex::Female, 20.0),
                ("Canada", Sex::Male, 150.0),
                ("Finland", Sex::Male, 10.0),
            ]
        );
        assert_eq!(view.countries, vec!["Canada".to_string(), "Finland".to_string()]);
    }

    #[test]
    fn test_comparison_empty() {
        let countries = vec!["Atlantis".to_string()];
        assert!(comparison(&sample(), &countries, 2000, TotalsPolicy::AllRows).is_none());
    }

    fn finland_with_age_total() -> Dataset {
        Dataset::from_records(vec![
            record("Europe", "Finland", 2000, Sex::Male, "[All]", 10.0),
            record("Europe", "Finland", 2000, Sex::Male, "[0]", 4.0),
            record("Europe", "Finland", 2000, Sex::Male, "[1-4]", 6.0),
            record("Europe", "Finland", 2000, Sex::Female, "[0]", 3.0),
        ])
    }

    #[test]
    fn test_region_bars_exclude_aggregates() {
        let dataset = sample();

        let all_rows = region_bars(&dataset, "Americas", 2000, None, TotalsPolicy::AllRows);
        assert_eq!(all_rows.bars[0].number, 650.0);
        assert!(all_rows.double_counted);

        let excluded = region_bars(
            &dataset,
            "Americas",
            2000,
            None,
            TotalsPolicy::ExcludeAggregates,
        );
        assert_eq!(excluded.bars.len(), 1);
        assert_eq!(excluded.bars[0].country, "Canada");
        assert_eq!(excluded.bars[0].number, 350.0);
        assert!(!excluded.double_counted);
    }

    #[test]
    fn test_trend_exclude_aggregates_drops_age_total() {
        let dataset = finland_with_age_total();

        let all_rows = trend(&dataset, "Finland", TotalsPolicy::AllRows).unwrap();
        assert_eq!(all_rows.male.points, vec![YearValue { year: 2000, number: 20.0 }]);
        assert_eq!(all_rows.average.points, vec![YearValue { year: 2000, number: 23.0 }]);
        assert!(all_rows.double_counted);

        let excluded = trend(&dataset, "Finland", TotalsPolicy::ExcludeAggregates).unwrap();
        assert_eq!(excluded.male.points, vec![YearValue { year: 2000, number: 10.0 }]);
        assert_eq!(excluded.female.points, vec![YearValue { year: 2000, number: 3.0 }]);
        assert_eq!(excluded.average.points, vec![YearValue { year: 2000, number: 13.0 }]);
        assert!(!excluded.double_counted);
    }

    #[test]
    fn test_trend_average_exclude_aggregates() {
        let dataset = sample();
        let finland = trend(&dataset, "Finland", TotalsPolicy::ExcludeAggregates).unwrap();

        // 2000: Finland 30, Sweden 40, Canada 350 without its Sex=All row.
        assert_eq!(finland.average.points[0], YearValue { year: 2000, number: 140.0 });
        assert_eq!(finland.average.points[1], YearValue { year: 2001, number: 3.0 });
        assert!(!finland.double_counted);
    }

    #[test]
    fn test_comparison_flags_age_total() {
        let dataset = finland_with_age_total();
        let countries = vec!["Finland".to_string()];

        let all_rows = comparison(&dataset, &countries, 2000, TotalsPolicy::AllRows).unwrap();
        let male = all_rows.bars.iter().find(|b| b.gender == Sex::Male).unwrap();
        assert_eq!(male.number, 20.0);
        assert!(all_rows.double_counted);

        let excluded =
            comparison(&dataset, &countries, 2000, TotalsPolicy::ExcludeAggregates).unwrap();
        let male = excluded.bars.iter().find(|b| b.gender == Sex::Male).unwrap();
        assert_eq!(male.number, 10.0);
        assert!(!excluded.double_counted);
    }

    #[test]
    fn test_comparison_without_age_total_is_not_flagged() {
        let dataset = sample();
        let countries = vec!["Finland".to_string(), "Canada".to_string()];
        let view = comparison(&dataset, &countries, 2000, TotalsPolicy::AllRows).unwrap();
        assert!(!view.double_counted);
    }

    #[test]
    fn test_strip_and_rank() {
        assert_eq!(strip_age_brackets("[85+]"), "85+");
        assert_eq!(strip_age_brackets("1-4"), "1-4");
        assert_eq!(age_rank("0"), 0);
        assert_eq!(age_rank("85+"), 18);
        assert_eq!(age_rank("0-4"), AGE_ORDER.len());
    }
}
