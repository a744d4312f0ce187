use crate::analysis::{self, GenreAverage, Summary};
use crate::normalize::NormalizedRecord;
use crate::store::{MovieRow, Stats};

const TOP_N: usize = 10;
const EXTREMES_N: usize = 5;

pub fn print_summary(s: &Summary) {
    println!("Basic statistics");
    println!("  Movies:            {}", s.total);
    println!("  Rated:             {}", s.rated);
    println!("  With duration:     {}", s.with_duration);
    if let Some(r) = &s.rating {
        println!("  Average rating:    {:.2}", r.mean);
        println!("  Median rating:     {:.2}", r.median);
        println!("  Highest rating:    {:.1}", r.max);
        println!("  Lowest rating:     {:.1}", r.min);
    }
    if s.total_votes > 0 {
        println!("  Total votes:       {}", s.total_votes);
        if let Some(m) = s.mean_votes {
            println!("  Votes per movie:   {:.0}", m);
        }
        if let Some(t) = &s.most_voted {
            println!("  Most voted:        {}", t);
        }
    }
    if let Some(d) = s.mean_duration {
        println!("  Average duration:  {:.1}h", d);
    }
    if let Some((t, h)) = &s.shortest {
        println!("  Shortest:          {} ({:.1}h)", t, h);
    }
    if let Some((t, h)) = &s.longest {
        println!("  Longest:           {} ({:.1}h)", t, h);
    }

    println!("\nGenres");
    if let Some(g) = s.most_popular_genre() {
        println!("  Most popular:      {}", g);
    }
    if let Some((g, avg)) = s.highest_rated_genre {
        println!("  Highest rated:     {} (avg {:.2})", g, avg);
    }
    for (genre, count) in s.genre_counts.iter().take(TOP_N) {
        println!("  {:<14} {:>5}  ({})", genre, count, percent(*count, s.total));
    }

    println!("\nRatings");
    for (bucket, count) in &s.rating_buckets {
        println!("  {:<20} {:>5}  ({})", bucket.label(), count, percent(*count, s.total));
    }
    println!("\nDurations");
    for (bucket, count) in &s.duration_buckets {
        println!("  {:<20} {:>5}  ({})", bucket.label(), count, percent(*count, s.total));
    }

    if let Some((lo, hi)) = s.year_range {
        println!("\nYears: {} - {}", lo, hi);
        if let Some((year, n)) = s.most_productive_year {
            println!("  Most productive:   {} ({} movies)", year, n);
        }
    }

    println!("\nQuality");
    println!(
        "  High quality (8.0+):     {} ({})",
        s.high_quality,
        percent(s.high_quality, s.total)
    );
    println!("  Popular & high quality:  {}", s.popular_and_quality);
}

pub fn print_movies(title: &str, movies: &[&NormalizedRecord]) {
    println!("\n{}", title);
    println!(
        "{:>3} | {:<36} | {:>4} | {:>6} | {:>9} | {:>5} | {:<12}",
        "#", "Title", "Year", "Rating", "Votes", "Hours", "Genre"
    );
    println!("{}", "-".repeat(94));
    for (i, m) in movies.iter().enumerate() {
        println!(
            "{:>3} | {:<36} | {:>4} | {:>6} | {:>9} | {:>5} | {:<12}",
            i + 1,
            truncate(&m.title, 36),
            opt(m.year),
            m.rating.map(|r| format!("{:.1}", r)).unwrap_or_else(|| "-".into()),
            opt(m.votes),
            m.duration_hours.map(|h| format!("{:.2}", h)).unwrap_or_else(|| "-".into()),
            m.primary_genre,
        );
    }
}

pub fn print_genre_averages(rows: &[GenreAverage]) {
    println!("\nBy genre");
    println!(
        "{:<14} | {:>6} | {:>10} | {:>9} | {:>12}",
        "Genre", "Movies", "Avg rating", "Avg hours", "Total votes"
    );
    println!("{}", "-".repeat(63));
    for g in rows {
        println!(
            "{:<14} | {:>6} | {:>10} | {:>9} | {:>12}",
            g.genre,
            g.movies,
            g.mean_rating.map(|r| format!("{:.2}", r)).unwrap_or_else(|| "-".into()),
            g.mean_duration.map(|h| format!("{:.2}", h)).unwrap_or_else(|| "-".into()),
            g.total_votes,
        );
    }
}

/// Full report over an already-filtered selection.
pub fn print_report(selection: &[&NormalizedRecord]) {
    let summary = Summary::compute(selection);
    print_summary(&summary);
    print_movies("Top rated", &analysis::top_rated(selection, TOP_N));
    print_movies("Genre leaders", &analysis::genre_leaders(selection));
    let (shortest, longest) = analysis::duration_extremes(selection, EXTREMES_N);
    print_movies("Shortest", &shortest);
    print_movies("Longest", &longest);
    print_genre_averages(&analysis::genre_averages(selection));
}

pub fn print_rows(rows: &[MovieRow]) {
    println!(
        "{:>4} | {:<36} | {:>4} | {:>6} | {:>9} | {:<20} | {:<18}",
        "Rank", "Title", "Year", "Rating", "Votes", "Genre", "Duration"
    );
    println!("{}", "-".repeat(115));
    for r in rows {
        println!(
            "{:>4} | {:<36} | {:>4} | {:>6} | {:>9} | {:<20} | {:<18}",
            opt(r.rank),
            truncate(&r.title, 36),
            opt(r.year),
            r.rating.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".into()),
            opt(r.votes),
            r.primary_genre,
            r.duration_category,
        );
    }
    let with_url = rows.iter().filter(|r| r.url.is_some()).count();
    println!("\n{} movies ({} with URL)", rows.len(), with_url);
    if let Some(r) = rows.first() {
        println!(
            "Top: {} [{} | {} | {}] {}",
            r.title,
            r.rating_category,
            r.genres.join(", "),
            r.duration_hours.map(|h| format!("{:.2}h", h)).unwrap_or_else(|| "-".into()),
            r.url.as_deref().unwrap_or("-")
        );
    }
}

pub fn print_stats(s: &Stats) {
    println!("Movies:        {}", s.total);
    println!("Rated:         {}", s.rated);
    println!("With duration: {}", s.with_duration);
    println!("Loads:         {}", s.runs);
    if let Some(run) = &s.last_run {
        println!("Last load:     {}", run);
    }
    println!("\nBy rating");
    for (label, n) in &s.by_rating {
        println!("  {:<20} {:>6}", label, n);
    }
    println!("\nBy duration");
    for (label, n) in &s.by_duration {
        println!("  {:<20} {:>6}", label, n);
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|x| x.to_string()).unwrap_or_else(|| "-".into())
}

fn percent(n: usize, total: usize) -> String {
    if total == 0 {
        "0.0%".into()
    } else {
        format!("{:.1}%", n as f64 * 100.0 / total as f64)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
