use crate::error::{Error, Result};
use crate::models::{Coordinate, ListingFields};
use crate::scrapers::traits::ListingParser;
use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

const SQ_FEET_PER_SQ_METRE: f64 = 10.764;

/// Parser for daft.ie search results and listing pages
pub struct DaftParser {
    link: Selector,
    price: Selector,
    address: Selector,
    script: Selector,
    alt: Selector,
    floor_area: Selector,
    location_re: Regex,
    added_re: Regex,
    beds_re: Regex,
    baths_re: Regex,
    area_re: Regex,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Config(format!("invalid selector {css:?}: {e}")))
}

fn regex(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::Config(format!("invalid pattern {pattern:?}: {e}")))
}

impl DaftParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            link: selector("a.PropertyInformationCommonStyles__addressCopy--link[href]")?,
            price: selector("strong.PropertyInformationCommonStyles__costAmountCopy")?,
            address: selector("h1.PropertyMainInformation__address")?,
            script: selector("script")?,
            alt: selector("[alt]")?,
            floor_area: selector("span.PropertyOverview__floorArea")?,
            location_re: regex(r#""longitude":(-?[0-9.]+),"latitude":(-?[0-9.]+)"#)?,
            added_re: regex(r#""published_date":"([0-9]{4})-([0-9]{2})-([0-9]{2})""#)?,
            beds_re: regex(r"^Number of beds is ([0-9]+)")?,
            baths_re: regex(r"^Number of bathroom is ([0-9]+)")?,
            area_re: regex(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(ft|m)?")?,
        })
    }

    /// The inline script carrying the tracking parameters, if any
    fn tracking_params(&self, doc: &Html) -> Option<String> {
        doc.select(&self.script)
            .map(|s| s.text().collect::<String>())
            .find(|text| text.contains("var trackingParam"))
    }

    fn location(&self, params: &str) -> Option<Coordinate> {
        let caps = self.location_re.captures(params)?;
        let longitude = caps[1].parse::<f64>().ok()?;
        let latitude = caps[2].parse::<f64>().ok()?;
        Some(Coordinate::new(latitude, longitude))
    }

    fn added(&self, params: &str) -> Option<NaiveDate> {
        let caps = self.added_re.captures(params)?;
        NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        )
    }

    fn count_from_alt(&self, doc: &Html, re: &Regex) -> Option<i64> {
        doc.select(&self.alt)
            .filter_map(|el| el.value().attr("alt"))
            .find_map(|alt| re.captures(alt).and_then(|caps| caps[1].parse().ok()))
    }

    fn area(&self, doc: &Html) -> Option<f64> {
        let span = doc.select(&self.floor_area).next()?;
        let sibling = span.next_sibling()?;
        let text = match sibling.value().as_text() {
            Some(text) => text.text.to_string(),
            None => ElementRef::wrap(sibling)?.text().collect::<String>(),
        };
        parse_area(&self.area_re, &text)
    }
}

/// Strips currency symbols and thousands separators: "€1,850 per month" -> 1850
pub fn parse_price(text: &str) -> Option<i64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '.' | ','))
        .collect();
    cleaned.split_whitespace().next()?.parse().ok()
}

/// Floor area in square metres; values in square feet are converted
fn parse_area(re: &Regex, text: &str) -> Option<f64> {
    let caps = re.captures(text)?;
    let value: f64 = caps[1].parse().ok()?;
    match caps.get(2).map(|m| m.as_str().to_lowercase()) {
        Some(unit) if unit == "ft" => Some(value / SQ_FEET_PER_SQ_METRE),
        _ => Some(value),
    }
}

impl ListingParser for DaftParser {
    fn parse_links(&self, content: &str) -> Result<Vec<String>> {
        let doc = Html::parse_document(content);
        let links: Vec<String> = doc
            .select(&self.link)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string)
            .collect();
        debug!("Found {} listing links", links.len());
        Ok(links)
    }

    fn parse_listing(&self, url: &str, content: &str) -> Result<ListingFields> {
        let doc = Html::parse_document(content);

        let address = doc
            .select(&self.address)
            .next()
            .map(|h1| h1.text().collect::<String>().trim().to_string())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| Error::Parse {
                url: url.to_string(),
                reason: "no address heading".to_string(),
            })?;

        let price = doc
            .select(&self.price)
            .next()
            .and_then(|el| parse_price(&el.text().collect::<String>()));

        let params = self.tracking_params(&doc);

        Ok(ListingFields {
            price,
            address,
            location: params.as_deref().and_then(|p| self.location(p)),
            beds: self.count_from_alt(&doc, &self.beds_re),
            bathrooms: self.count_from_alt(&doc, &self.baths_re),
            area: self.area(&doc),
            added: params.as_deref().and_then(|p| self.added(p)),
        })
    }
}
