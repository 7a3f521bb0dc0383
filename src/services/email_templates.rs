//! Plantillas de email
//!
//! Confirmación para el cliente (francés, o inglés para cualquier otro
//! idioma) y aviso al operador (siempre en francés). Todo dato introducido
//! por el usuario se escapa en la versión HTML.

use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::models::booking::Language;
use crate::models::reservation::Reservation;

pub const CUSTOMER_CONFIRMATION_TEMPLATE: &str = "booking_confirmation";
pub const OPERATOR_NOTIFICATION_TEMPLATE: &str = "operator_notification";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub template: &'static str,
    pub language: Language,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Renderizador de emails con la zona horaria local del servicio
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    offset: FixedOffset,
}

impl EmailTemplates {
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    fn format_time(&self, instant: DateTime<Utc>) -> String {
        instant.with_timezone(&self.offset).format("%d/%m/%Y %H:%M").to_string()
    }

    fn pickup_label(&self, reservation: &Reservation, language: Language) -> String {
        match (reservation.booking.is_immediate, reservation.booking.scheduled_at, language) {
            (false, Some(at), _) => self.format_time(at),
            (_, _, Language::Fr) => "Dès que possible".to_string(),
            _ => "As soon as possible".to_string(),
        }
    }

    /// Confirmación de reserva para el cliente
    pub fn customer_confirmation(&self, reservation: &Reservation) -> RenderedEmail {
        let language = match reservation.customer.language {
            Language::Fr => Language::Fr,
            _ => Language::En,
        };
        let pickup = self.pickup_label(reservation, language);
        let price = reservation.formatted_price();
        let duration = reservation.formatted_duration();
        let trip = &reservation.trip;

        let (subject, greeting, intro, labels, closing) = if language == Language::Fr {
            (
                format!("Confirmation de votre réservation {}", reservation.id),
                format!("Bonjour {},", reservation.customer.name),
                "Votre réservation de taxi a bien été enregistrée.",
                ["Référence", "Départ", "Arrivée", "Prise en charge", "Passagers", "Durée estimée", "Prix estimé"],
                "Un chauffeur vous sera attribué prochainement. Merci de votre confiance.",
            )
        } else {
            (
                format!("Your booking confirmation {}", reservation.id),
                format!("Hello {},", reservation.customer.name),
                "Your taxi booking has been registered.",
                ["Reference", "From", "To", "Pickup", "Passengers", "Estimated duration", "Estimated price"],
                "A driver will be assigned shortly. Thank you for your trust.",
            )
        };

        let values = [
            reservation.id.clone(),
            trip.origin.address.clone(),
            trip.destination.address.clone(),
            pickup,
            reservation.booking.passengers.to_string(),
            duration,
            price,
        ];
        let rows: Vec<(&str, &str)> = labels
            .iter()
            .copied()
            .zip(values.iter().map(String::as_str))
            .collect();

        RenderedEmail {
            template: CUSTOMER_CONFIRMATION_TEMPLATE,
            language,
            text: render_text(&greeting, intro, &rows, closing),
            html: render_html(&greeting, intro, &rows, closing),
            subject,
        }
    }

    /// Aviso de nueva reserva para el operador
    pub fn operator_notification(&self, reservation: &Reservation) -> RenderedEmail {
        let booking = &reservation.booking;
        let customer = &reservation.customer;
        let requests = booking.special_requests.labels();

        let subject = format!(
            "Nouvelle réservation {} - {}",
            reservation.id,
            reservation.formatted_price()
        );
        let values = [
            ("Référence", reservation.id.clone()),
            ("Client", customer.name.clone()),
            ("Téléphone", customer.phone.clone()),
            ("Email", customer.email.clone().unwrap_or_else(|| "-".to_string())),
            ("Départ", reservation.trip.origin.address.clone()),
            ("Arrivée", reservation.trip.destination.address.clone()),
            ("Prise en charge", self.pickup_label(reservation, Language::Fr)),
            ("Distance", format!("{:.1} km", reservation.trip.distance_km)),
            ("Durée", reservation.formatted_duration()),
            ("Passagers", booking.passengers.to_string()),
            ("Bagages", booking.luggage.to_string()),
            ("Langue", booking.language.to_string()),
            (
                "Demandes spéciales",
                if requests.is_empty() { "-".to_string() } else { requests.join(", ") },
            ),
            ("Notes", booking.notes.clone().unwrap_or_else(|| "-".to_string())),
            ("Prix", reservation.formatted_price()),
            ("Source", reservation.metadata.source.clone()),
        ];
        let rows: Vec<(&str, &str)> = values.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let intro = "Une nouvelle réservation vient d'être enregistrée.";
        RenderedEmail {
            template: OPERATOR_NOTIFICATION_TEMPLATE,
            language: Language::Fr,
            text: render_text("Bonjour,", intro, &rows, ""),
            html: render_html("Bonjour,", intro, &rows, ""),
            subject,
        }
    }
}

fn render_text(greeting: &str, intro: &str, rows: &[(&str, &str)], closing: &str) -> String {
    let mut text = format!("{}\n\n{}\n\n", greeting, intro);
    for (label, value) in rows {
        text.push_str(&format!("{} : {}\n", label, value));
    }
    if !closing.is_empty() {
        text.push_str(&format!("\n{}\n", closing));
    }
    text
}

fn render_html(greeting: &str, intro: &str, rows: &[(&str, &str)], closing: &str) -> String {
    let mut html = format!(
        "<p>{}</p>\n<p>{}</p>\n<table>\n",
        escape_html(greeting),
        escape_html(intro)
    );
    for (label, value) in rows {
        html.push_str(&format!(
            "<tr><th align=\"left\">{}</th><td>{}</td></tr>\n",
            escape_html(label),
            escape_html(value)
        ));
    }
    html.push_str("</table>\n");
    if !closing.is_empty() {
        html.push_str(&format!("<p>{}</p>\n", escape_html(closing)));
    }
    html
}

/// Escapar caracteres especiales HTML
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::reservation::Reservation;
    use crate::models::test_support::draft;
    use chrono::Duration;

    fn templates() -> EmailTemplates {
        EmailTemplates::new(60)
    }

    #[test]
    fn test_customer_confirmation_in_french() {
        let reservation = Reservation::create(draft(), Utc::now()).unwrap();
        let email = templates().customer_confirmation(&reservation);

        assert_eq!(email.template, CUSTOMER_CONFIRMATION_TEMPLATE);
        assert_eq!(email.language, Language::Fr);
        assert!(email.subject.contains(&reservation.id));
        assert!(email.text.contains("Bonjour Camille Martin,"));
        assert!(email.text.contains("Prix estimé : 55,00 €"));
        assert!(email.text.contains("Dès que possible"));
    }

    #[test]
    fn test_other_languages_fall_back_to_english() {
        let mut d = draft();
        d.customer.language = Language::De;
        d.booking.is_immediate = false;
        let now = Utc::now();
        d.booking.scheduled_at = Some(now + Duration::days(1));
        let reservation = Reservation::create(d, now).unwrap();

        let email = templates().customer_confirmation(&reservation);
        assert_eq!(email.language, Language::En);
        assert!(email.subject.starts_with("Your booking confirmation"));
        assert!(!email.text.contains("As soon as possible"));
    }

    #[test]
    fn test_operator_notification_escapes_user_input() {
        let mut d = draft();
        d.customer.name = "<script>alert('x')</script>".to_string();
        d.booking.notes = Some("Porte \"B\" & code 1234".to_string());
        d.booking.special_requests.child_seat = true;
        let reservation = Reservation::create(d, Utc::now()).unwrap();

        let email = templates().operator_notification(&reservation);
        assert_eq!(email.language, Language::Fr);
        assert!(email.html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(email.html.contains("Porte &quot;B&quot; &amp; code 1234"));
        assert!(!email.html.contains("<script>"));
        assert!(email.text.contains("Demandes spéciales : Siège enfant"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }
}
