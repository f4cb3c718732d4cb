// src/services/parser.rs

//! HTML extraction for listing and detail pages.
//!
//! Listing pages carry company cards with a schema.org URL meta tag;
//! detail pages lay fields out as `<h3>Label</h3>` followed by a sibling
//! value element. Placeholder values ("Añadir Teléfono" etc.) count as
//! absent.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Company, CompanyRef};
use crate::utils::{build_company_url, company_id_from_url};

/// Values the site renders where data is missing.
const PLACEHOLDERS: [&str; 4] = ["añadir", "agregar", "no disponible", "no consta"];

/// Extract company detail-page refs from one listing page.
pub fn parse_listing_page(html: &str, base_url: &str) -> Result<Vec<CompanyRef>> {
    let document = Html::parse_document(html);
    let card_sel = parse_selector("div.cardCompanyBox")?;
    let meta_sel = parse_selector(r#"meta[itemprop="url"]"#)?;
    let link_sel = parse_selector("h3 a[href]")?;

    let mut refs = Vec::new();
    for card in document.select(&card_sel) {
        let href = card
            .select(&meta_sel)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .or_else(|| {
                card.select(&link_sel)
                    .find_map(|a| a.value().attr("href").filter(|h| h.ends_with(".html")))
            });

        if let Some(href) = href {
            let url = build_company_url(base_url, href);
            refs.push(CompanyRef {
                id: company_id_from_url(&url),
                url,
            });
        }
    }
    Ok(refs)
}

/// Total result count announced on a listing page, 0 when undeterminable.
pub fn parse_result_count(html: &str) -> usize {
    let document = Html::parse_document(html);

    if let Ok(sel) = Selector::parse("#filter-numresultados") {
        if let Some(el) = document.select(&sel).next() {
            let text: String = el.text().collect();
            if let Some(count) = capture_count(&text, r"(\d+)\s*empresas?") {
                return count;
            }
        }
    }

    // Fallback: scan the whole document text
    let text = document.root_element().text().collect::<String>();
    capture_count(&text, r"Hemos encontrado\s+(\d+)\s+empresas?").unwrap_or(0)
}

fn capture_count(text: &str, pattern: &str) -> Option<usize> {
    let re = Regex::new(pattern).ok()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Parse a company detail page into a record.
///
/// Fields that cannot be located stay empty; completeness is judged by
/// the caller via [`Company::is_complete`].
pub fn parse_company_page(html: &str, url: &str) -> Result<Company> {
    let document = Html::parse_document(html);
    let h3_sel = parse_selector("h3")?;

    let field = |label: &str| extract_field(&document, &h3_sel, label);
    let first_of = |labels: &[&str]| {
        labels
            .iter()
            .map(|label| field(label))
            .find(|v| !v.is_empty())
            .unwrap_or_default()
    };

    let mut company = Company {
        source_url: url.to_string(),
        ..Company::default()
    };

    company.legal_name = field("Razón social");
    if company.legal_name.is_empty() {
        company.legal_name = title_fallback(&document)?;
    }

    company.tax_id = field("CIF");
    company.legal_form = field("Forma jur");
    company.sector = field("Sector");
    company.founded = field("Fecha de constituci");
    company.corporate_purpose = field("Objeto social");
    company.activity = first_of(&["Actividad CNAE", "Actividad"]);
    company.cnae = field("CNAE");
    company.status = field("Estado");

    company.address = field("Direcci");
    if company.address.is_empty() {
        let addr_sel = parse_selector(r#"[itemprop="address"]"#)?;
        if let Some(el) = document.select(&addr_sel).next() {
            company.address = clean_text(&el.text().collect::<String>());
        }
    }

    company.phone = first_of(&["Teléfono", "Tel"]);
    company.email = first_of(&["Email", "Correo"]);
    company.website = first_of(&["Web", "Página web"]);
    if is_placeholder(&company.website) {
        company.website.clear();
    }

    company.sales = first_of(&["ventas", "Facturación", "Evolución de ventas"]);
    company.employees = first_of(&["empleados", "Número de empleados"]);
    company.shareholdings = field("Participaciones");
    company.international_ops = field("Operaciones Internacional");
    company.sector_group = field("Grupo Sector");
    company.publicly_listed = field("Cotiza");

    Ok(company)
}

/// Find the value for an `<h3>Label</h3>` field.
///
/// The value usually lives in the next sibling element; some layouts put
/// it as loose text inside the shared parent instead.
fn extract_field(document: &Html, h3_sel: &Selector, label: &str) -> String {
    let needle = label.to_lowercase();
    for h3 in document.select(h3_sel) {
        let heading = clean_text(&h3.text().collect::<String>());
        if !heading.to_lowercase().contains(&needle) {
            continue;
        }

        if let Some(sibling) = h3.next_siblings().find_map(ElementRef::wrap) {
            let value = clean_text(&sibling.text().collect::<String>());
            if !value.is_empty() && !is_placeholder(&value) {
                return value;
            }
        }

        if let Some(parent) = h3.parent() {
            let mut parts = Vec::new();
            for child in parent.children() {
                if child.id() == h3.id() {
                    continue;
                }
                let text = match ElementRef::wrap(child) {
                    Some(el) => clean_text(&el.text().collect::<String>()),
                    None => child
                        .value()
                        .as_text()
                        .map(|t| clean_text(t))
                        .unwrap_or_default(),
                };
                if !text.is_empty() && !is_placeholder(&text) {
                    parts.push(text);
                }
            }
            if !parts.is_empty() {
                return parts.join(" ");
            }
        }
    }
    String::new()
}

/// Page titles read "COMPANY NAME - Empresite".
fn title_fallback(document: &Html) -> Result<String> {
    let title_sel = parse_selector("title")?;
    Ok(document
        .select(&title_sel)
        .next()
        .map(|el| clean_text(&el.text().collect::<String>()))
        .and_then(|t| t.split(" - ").next().map(|s| s.trim().to_string()))
        .unwrap_or_default())
}

fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_placeholder(text: &str) -> bool {
    let lower = text.to_lowercase();
    PLACEHOLDERS.iter().any(|p| lower.contains(p))
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://empresite.eleconomista.es";

    #[test]
    fn listing_extracts_card_urls() {
        let html = r#"
            <div class="cardCompanyBox">
                <meta itemprop="url" content="/ACME-PESCA.html">
                <h3><a href="/ACME-PESCA.html">Acme Pesca</a></h3>
            </div>
            <div class="cardCompanyBox">
                <h3><a href="https://empresite.eleconomista.es/NOVANTOLIN-PESCA.html">Novantolin</a></h3>
            </div>
            <div class="otherBox"><a href="/ad.html">ad</a></div>
        "#;
        let refs = parse_listing_page(html, BASE).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].id, "ACME-PESCA");
        assert_eq!(refs[0].url, format!("{BASE}/ACME-PESCA.html"));
        assert_eq!(refs[1].id, "NOVANTOLIN-PESCA");
    }

    #[test]
    fn listing_without_cards_is_empty() {
        let refs = parse_listing_page("<html><body>nada</body></html>", BASE).unwrap();
        assert!(refs.is_empty());
    }

    #[test]
    fn result_count_from_filter_panel() {
        let html = r#"<div id="filter-numresultados">Hemos encontrado 143 empresas de Pesca</div>"#;
        assert_eq!(parse_result_count(html), 143);
    }

    #[test]
    fn result_count_fallback_and_default() {
        let html = "<p>Hemos encontrado 7 empresas</p>";
        assert_eq!(parse_result_count(html), 7);
        assert_eq!(parse_result_count("<p>nada</p>"), 0);
    }

    #[test]
    fn company_page_fields() {
        let html = r#"
            <html><head><title>ACME PESCA SL - Empresite</title></head><body>
            <section>
                <div><h3>Razón social</h3><p>ACME PESCA SL</p></div>
                <div><h3>CIF</h3><p>B12345678</p></div>
                <div><h3>Forma jurídica</h3><p>Sociedad Limitada</p></div>
                <div><h3>Teléfono</h3><p>Añadir Teléfono</p></div>
                <div><h3>Dirección</h3><p>CALLE MAYOR 1,
                    VIGO</p></div>
                <div><h3>Número de empleados</h3><p>12 (2023)</p></div>
            </section>
            </body></html>
        "#;
        let company = parse_company_page(html, "https://x/ACME-PESCA.html").unwrap();
        assert_eq!(company.legal_name, "ACME PESCA SL");
        assert_eq!(company.tax_id, "B12345678");
        assert_eq!(company.legal_form, "Sociedad Limitada");
        // Placeholder values count as absent
        assert!(company.phone.is_empty());
        // Whitespace is normalized
        assert_eq!(company.address, "CALLE MAYOR 1, VIGO");
        assert_eq!(company.employees, "12 (2023)");
        assert_eq!(company.source_url, "https://x/ACME-PESCA.html");
        assert!(company.is_complete());
    }

    #[test]
    fn legal_name_falls_back_to_title() {
        let html = r#"
            <html><head><title>NOVANTOLIN PESCA - Empresite</title></head>
            <body><h3>CIF</h3><p>B87654321</p></body></html>
        "#;
        let company = parse_company_page(html, "https://x/n.html").unwrap();
        assert_eq!(company.legal_name, "NOVANTOLIN PESCA");
        assert!(company.is_complete());
    }

    #[test]
    fn missing_mandatory_fields_yield_incomplete_record() {
        let html = "<html><head><title></title></head><body><p>vacío</p></body></html>";
        let company = parse_company_page(html, "https://x/e.html").unwrap();
        assert!(!company.is_complete());
    }
}
