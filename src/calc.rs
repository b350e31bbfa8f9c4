use crate::model::{AttendanceRecord, ExamResult, Student};
use serde::Serialize;
use std::collections::BTreeMap;

pub const GOOD_ATTENDANCE_PCT: f64 = 75.0;
pub const AVERAGE_ATTENDANCE_PCT: f64 = 50.0;

/// Display rounding for percentages and marks: half away from zero, 2 decimals.
pub fn round_off_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusBand {
    Good,
    Average,
    Poor,
}

impl StatusBand {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusBand::Good => "Good",
            StatusBand::Average => "Average",
            StatusBand::Poor => "Poor",
        }
    }
}

pub fn status_band(pct: f64) -> StatusBand {
    if pct >= GOOD_ATTENDANCE_PCT {
        StatusBand::Good
    } else if pct >= AVERAGE_ATTENDANCE_PCT {
        StatusBand::Average
    } else {
        StatusBand::Poor
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceTally {
    pub total: usize,
    pub present: usize,
    pub absent: usize,
}

impl AttendanceTally {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * (self.present as f64) / (self.total as f64)
    }

    pub fn add(&mut self, rec: &AttendanceRecord) {
        self.total += 1;
        if rec.status.is_present() {
            self.present += 1;
        } else {
            self.absent += 1;
        }
    }
}

fn matches(rec: &AttendanceRecord, roll_no: &str, subject: Option<&str>) -> bool {
    rec.roll_no == roll_no && subject.map(|s| rec.subject == s).unwrap_or(true)
}

/// Counts records of `roll_no`, optionally limited to an exact subject.
pub fn attendance_tally(
    records: &[AttendanceRecord],
    roll_no: &str,
    subject: Option<&str>,
) -> AttendanceTally {
    let mut tally = AttendanceTally::default();
    for rec in records.iter().filter(|r| matches(r, roll_no, subject)) {
        tally.add(rec);
    }
    tally
}

/// present / total * 100; 0.0 when the student has no matching records.
pub fn attendance_percentage(
    records: &[AttendanceRecord],
    roll_no: &str,
    subject: Option<&str>,
) -> f64 {
    attendance_tally(records, roll_no, subject).percentage()
}

/// Unique dates in ascending string order.
///
/// String order equals calendar order only for zero-padded `YYYY-MM-DD`.
pub fn distinct_dates(records: &[AttendanceRecord]) -> Vec<String> {
    let mut dates: Vec<String> = records.iter().map(|r| r.date.clone()).collect();
    dates.sort();
    dates.dedup();
    dates
}

/// Non-empty subjects of one student, in first-seen order.
pub fn distinct_subjects(records: &[AttendanceRecord], roll_no: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for rec in records {
        if rec.roll_no != roll_no || rec.subject.is_empty() {
            continue;
        }
        if !out.iter().any(|s| *s == rec.subject) {
            out.push(rec.subject.clone());
        }
    }
    out
}

/// Records of `roll_no` whose date starts with `month` (`YYYY-MM`).
pub fn month_filter<'a>(
    records: &'a [AttendanceRecord],
    roll_no: &str,
    month: &str,
) -> Vec<&'a AttendanceRecord> {
    records
        .iter()
        .filter(|r| r.roll_no == roll_no && r.date.get(..7) == Some(month))
        .collect()
}

pub fn grade_from_marks(marks: f64) -> &'static str {
    if marks >= 90.0 {
        "A+"
    } else if marks >= 80.0 {
        "A"
    } else if marks >= 70.0 {
        "B+"
    } else if marks >= 60.0 {
        "B"
    } else if marks >= 50.0 {
        "C"
    } else if marks >= 40.0 {
        "D"
    } else {
        "F"
    }
}

pub fn average_marks<'a, I>(results: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a ExamResult>,
{
    let mut sum = 0.0;
    let mut n: usize = 0;
    for r in results {
        sum += r.marks;
        n += 1;
    }
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub count: usize,
    pub average_marks: f64,
    /// Graded from the average, never taken from a stored grade.
    pub overall_grade: String,
}

pub fn performance_summary<'a, I>(results: I) -> Option<PerformanceSummary>
where
    I: IntoIterator<Item = &'a ExamResult>,
{
    let list: Vec<&ExamResult> = results.into_iter().collect();
    let avg = average_marks(list.iter().copied())?;
    Some(PerformanceSummary {
        count: list.len(),
        average_marks: avg,
        overall_grade: grade_from_marks(avg).to_string(),
    })
}

pub fn group_by_department(students: &[Student]) -> BTreeMap<String, Vec<&Student>> {
    let mut out: BTreeMap<String, Vec<&Student>> = BTreeMap::new();
    for s in students {
        out.entry(s.department.clone()).or_default().push(s);
    }
    out
}

pub fn group_by_semester(students: &[Student]) -> BTreeMap<u32, Vec<&Student>> {
    let mut out: BTreeMap<u32, Vec<&Student>> = BTreeMap::new();
    for s in students {
        out.entry(s.semester).or_default().push(s);
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub department: String,
    pub student_count: usize,
    pub average_pct: f64,
    pub good: usize,
    pub average: usize,
    pub poor: usize,
}

/// Folds per-student percentages into per-department rows, ordered by department.
pub fn summarize_departments<'a, I>(per_student: I) -> Vec<DepartmentSummary>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let mut by_dept: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for (dept, pct) in per_student {
        by_dept.entry(dept).or_default().push(pct);
    }

    by_dept
        .into_iter()
        .map(|(dept, pcts)| {
            let mut row = DepartmentSummary {
                department: dept.to_string(),
                student_count: pcts.len(),
                average_pct: 0.0,
                good: 0,
                average: 0,
                poor: 0,
            };
            for pct in &pcts {
                match status_band(*pct) {
                    StatusBand::Good => row.good += 1,
                    StatusBand::Average => row.average += 1,
                    StatusBand::Poor => row.poor += 1,
                }
            }
            if !pcts.is_empty() {
                row.average_pct = pcts.iter().sum::<f64>() / pcts.len() as f64;
            }
            row
        })
        .collect()
}

pub fn department_summaries(
    students: &[Student],
    records: &[AttendanceRecord],
) -> Vec<DepartmentSummary> {
    summarize_departments(students.iter().map(|s| {
        (
            s.department.as_str(),
            attendance_percentage(records, &s.roll_no, None),
        )
    }))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterStatistics {
    pub total_students: usize,
    pub by_department: BTreeMap<String, usize>,
    pub by_semester: BTreeMap<u32, usize>,
}

pub fn register_statistics(students: &[Student]) -> RegisterStatistics {
    RegisterStatistics {
        total_students: students.len(),
        by_department: group_by_department(students)
            .into_iter()
            .map(|(k, v)| (k, v.len()))
            .collect(),
        by_semester: group_by_semester(students)
            .into_iter()
            .map(|(k, v)| (k, v.len()))
            .collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAttendance {
    pub subject: String,
    pub tally: AttendanceTally,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceBreakdown {
    pub roll_no: String,
    pub overall: AttendanceTally,
    pub overall_pct: f64,
    pub band: StatusBand,
    pub subjects: Vec<SubjectAttendance>,
}

pub fn subject_breakdown(records: &[AttendanceRecord], roll_no: &str) -> AttendanceBreakdown {
    let overall = attendance_tally(records, roll_no, None);
    let subjects = distinct_subjects(records, roll_no)
        .into_iter()
        .map(|subject| {
            let tally = attendance_tally(records, roll_no, Some(subject.as_str()));
            SubjectAttendance {
                percentage: tally.percentage(),
                subject,
                tally,
            }
        })
        .collect();
    AttendanceBreakdown {
        roll_no: roll_no.to_string(),
        overall_pct: overall.percentage(),
        band: status_band(overall.percentage()),
        overall,
        subjects,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowAttendanceAlert {
    pub roll_no: String,
    pub name: String,
    pub percentage: f64,
}

impl LowAttendanceAlert {
    pub fn message(&self) -> String {
        // Legacy alerts show the truncated whole percent.
        format!(
            "Low attendance alert for {}: {}%",
            self.roll_no,
            self.percentage.trunc() as i64
        )
    }
}

/// Students strictly below `threshold`, in register order.
pub fn low_attendance_alerts(
    students: &[Student],
    records: &[AttendanceRecord],
    threshold: f64,
) -> Vec<LowAttendanceAlert> {
    students
        .iter()
        .filter_map(|s| {
            let pct = attendance_percentage(records, &s.roll_no, None);
            (pct < threshold).then(|| LowAttendanceAlert {
                roll_no: s.roll_no.clone(),
                name: s.name.clone(),
                percentage: pct,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttendanceStatus;
    use proptest::prelude::*;

    fn att(roll: &str, date: &str, code: &str, subject: &str) -> AttendanceRecord {
        AttendanceRecord {
            roll_no: roll.to_string(),
            date: date.to_string(),
            status: AttendanceStatus::from_code(code),
            subject: subject.to_string(),
        }
    }

    fn student(roll: &str, dept: &str, semester: u32) -> Student {
        Student {
            roll_no: roll.to_string(),
            name: format!("Student {roll}"),
            department: dept.to_string(),
            semester,
            email: String::new(),
            phone: String::new(),
        }
    }

    fn exam(roll: &str, marks: f64, grade: &str) -> ExamResult {
        ExamResult {
            roll_no: roll.to_string(),
            semester: "1".to_string(),
            subject: "Math".to_string(),
            marks,
            grade: grade.to_string(),
            exam_type: "Final".to_string(),
        }
    }

    fn s1_records() -> Vec<AttendanceRecord> {
        vec![
            att("S1", "2024-01-10", "P", "Math"),
            att("S1", "2024-01-11", "A", "Math"),
            att("S1", "2024-01-10", "P", ""),
        ]
    }

    #[test]
    fn overall_and_subject_percentages() {
        let recs = s1_records();
        let overall = attendance_percentage(&recs, "S1", None);
        assert!((overall - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(round_off_2_decimals(overall), 66.67);
        assert_eq!(attendance_percentage(&recs, "S1", Some("Math")), 50.0);
    }

    #[test]
    fn unseen_student_and_empty_input_are_zero() {
        assert_eq!(attendance_percentage(&s1_records(), "S9", None), 0.0);
        assert_eq!(attendance_percentage(&[], "S1", Some("Math")), 0.0);
        assert!(distinct_dates(&[]).is_empty());
        assert!(distinct_subjects(&[], "S1").is_empty());
        let no_results: Vec<ExamResult> = Vec::new();
        assert_eq!(average_marks(&no_results), None);
        assert!(department_summaries(&[], &[]).is_empty());
    }

    #[test]
    fn grade_boundaries_are_inclusive_lower_bounds() {
        assert_eq!(grade_from_marks(90.0), "A+");
        assert_eq!(grade_from_marks(89.999), "A");
        assert_eq!(grade_from_marks(80.0), "A");
        assert_eq!(grade_from_marks(70.0), "B+");
        assert_eq!(grade_from_marks(60.0), "B");
        assert_eq!(grade_from_marks(50.0), "C");
        assert_eq!(grade_from_marks(40.0), "D");
        assert_eq!(grade_from_marks(39.999), "F");
        assert_eq!(grade_from_marks(-5.0), "F");
    }

    #[test]
    fn overall_grade_comes_from_average_not_stored_grades() {
        let results = vec![exam("S1", 95.0, "A+"), exam("S1", 55.0, "C")];
        let summary = performance_summary(&results).expect("summary");
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average_marks, 75.0);
        assert_eq!(summary.overall_grade, "B+");
    }

    #[test]
    fn distinct_dates_sorted_without_duplicates() {
        let recs = vec![
            att("S2", "2024-02-01", "P", ""),
            att("S1", "2024-01-10", "P", ""),
            att("S1", "2024-02-01", "A", "Math"),
            att("S1", "2024-01-10", "A", "Math"),
        ];
        assert_eq!(distinct_dates(&recs), vec!["2024-01-10", "2024-02-01"]);
    }

    #[test]
    fn distinct_subjects_keep_first_seen_order() {
        let recs = vec![
            att("S1", "2024-01-10", "P", "Physics"),
            att("S2", "2024-01-10", "P", "Art"),
            att("S1", "2024-01-10", "P", ""),
            att("S1", "2024-01-11", "P", "Math"),
            att("S1", "2024-01-12", "A", "Physics"),
        ];
        assert_eq!(distinct_subjects(&recs, "S1"), vec!["Physics", "Math"]);
    }

    #[test]
    fn month_filter_is_a_prefix_match() {
        let recs = vec![
            att("S1", "2024-01-31", "P", ""),
            att("S1", "2024-02-01", "A", ""),
            att("S2", "2024-01-15", "P", ""),
            att("S1", "2024-1", "P", ""),
        ];
        let jan = month_filter(&recs, "S1", "2024-01");
        assert_eq!(jan.len(), 1);
        assert_eq!(jan[0].date, "2024-01-31");
    }

    #[test]
    fn department_rollup_matches_band_counts() {
        let rows = summarize_departments(vec![("CS", 80.0), ("CS", 40.0), ("EE", 60.0)]);
        assert_eq!(
            rows,
            vec![
                DepartmentSummary {
                    department: "CS".to_string(),
                    student_count: 2,
                    average_pct: 60.0,
                    good: 1,
                    average: 0,
                    poor: 1,
                },
                DepartmentSummary {
                    department: "EE".to_string(),
                    student_count: 1,
                    average_pct: 60.0,
                    good: 0,
                    average: 1,
                    poor: 0,
                },
            ]
        );
    }

    #[test]
    fn department_summaries_compute_percentages_from_records() {
        let students = vec![student("1", "CS", 1), student("2", "CS", 3)];
        let recs = vec![
            att("1", "2024-01-10", "P", ""),
            att("1", "2024-01-11", "P", ""),
            att("2", "2024-01-10", "A", ""),
        ];
        let rows = department_summaries(&students, &recs);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].average_pct, 50.0);
        assert_eq!((rows[0].good, rows[0].poor), (1, 1));
    }

    #[test]
    fn register_statistics_group_both_ways() {
        let students = vec![
            student("1", "CS", 1),
            student("2", "EE", 1),
            student("3", "CS", 3),
        ];
        let stats = register_statistics(&students);
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.by_department.get("CS"), Some(&2));
        assert_eq!(stats.by_semester.get(&1), Some(&2));
        assert_eq!(stats.by_semester.get(&3), Some(&1));
    }

    #[test]
    fn breakdown_lists_subjects_with_their_own_percentages() {
        let b = subject_breakdown(&s1_records(), "S1");
        assert_eq!(b.overall.total, 3);
        assert_eq!(b.band, StatusBand::Average);
        assert_eq!(b.subjects.len(), 1);
        assert_eq!(b.subjects[0].subject, "Math");
        assert_eq!(b.subjects[0].percentage, 50.0);
    }

    #[test]
    fn bands_split_at_75_and_50() {
        assert_eq!(status_band(75.0), StatusBand::Good);
        assert_eq!(status_band(74.99), StatusBand::Average);
        assert_eq!(status_band(50.0), StatusBand::Average);
        assert_eq!(status_band(49.99), StatusBand::Poor);
    }

    #[test]
    fn alerts_cover_students_below_threshold() {
        let students = vec![student("S1", "CS", 1), student("S2", "CS", 1)];
        let mut recs = s1_records();
        recs.push(att("S2", "2024-01-10", "P", ""));
        let alerts = low_attendance_alerts(&students, &recs, GOOD_ATTENDANCE_PCT);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].message(), "Low attendance alert for S1: 66%");
    }

    fn arb_records() -> impl Strategy<Value = Vec<AttendanceRecord>> {
        proptest::collection::vec(
            (
                prop::sample::select(vec!["S1", "S2"]),
                prop::sample::select(vec!["2024-01-10", "2024-01-11", "2024-02-01"]),
                any::<bool>(),
                prop::sample::select(vec!["", "Math", "Art"]),
            )
                .prop_map(|(roll, date, present, subject)| {
                    att(roll, date, if present { "P" } else { "A" }, subject)
                }),
            0..40,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_percentage_is_bounded_and_exact(recs in arb_records()) {
            let tally = attendance_tally(&recs, "S1", None);
            let pct = attendance_percentage(&recs, "S1", None);
            prop_assert!((0.0..=100.0).contains(&pct));
            if tally.total == 0 {
                prop_assert_eq!(pct, 0.0);
            } else {
                prop_assert_eq!(pct, 100.0 * tally.present as f64 / tally.total as f64);
            }
        }

        #[test]
        fn prop_distinct_dates_strictly_increasing(recs in arb_records()) {
            let dates = distinct_dates(&recs);
            prop_assert!(dates.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn prop_grade_never_improves_as_marks_drop(a in -10.0f64..110.0, b in -10.0f64..110.0) {
            let rank = |g: &str| ["A+", "A", "B+", "B", "C", "D", "F"].iter().position(|x| *x == g);
            let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
            prop_assert!(rank(grade_from_marks(hi)) <= rank(grade_from_marks(lo)));
        }
    }
}
