use actix_web::{get, HttpResponse, Responder};

#[get("/")]
async fn default() -> impl Responder {
    HttpResponse::Ok().body("Pricehound is up. Try /query?q=trimmers under 1000 on amazon")
}
