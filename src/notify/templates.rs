use uuid::Uuid;

use crate::models::assignment::{AssignedOrder, Otp};
use crate::models::order::Order;
use crate::notify::{Notification, NotificationKind};

const SIGN_OFF: &str = "Best regards,\nThe Delivery Team";

fn build(kind: NotificationKind, recipient: &str, subject: &str, body: String) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        kind,
        recipient: recipient.to_string(),
        subject: subject.to_string(),
        body,
    }
}

fn or_unset<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "not scheduled".to_string())
}

pub fn order_assigned(order: &Order, driver_name: &str, driver_phone: &str) -> Notification {
    let body = format!(
        "Dear {},\n\
         Your order with ID {} has been assigned to a driver.\n\
         Name: {driver_name}\n\
         Phone Number: {driver_phone}\n\n\
         {SIGN_OFF}",
        order.name, order.id
    );
    build(NotificationKind::OrderAssigned, &order.email, "Order Assigned", body)
}

pub fn driver_assigned(assignment: &AssignedOrder, driver_email: &str) -> Notification {
    let body = format!(
        "Dear {},\n\
         You have been assigned a new order with ID {}.\n\
         Pickup Address: {}\n\
         Drop Address: {}\n\
         Content: {}\n\
         Weight: {}\n\
         Pickup Date: {}\n\
         Pickup Time: {}\n\
         Please contact the customer if necessary.\n\n\
         {SIGN_OFF}",
        assignment.driver_name,
        assignment.order_id,
        assignment.pickup_address,
        assignment.drop_address,
        assignment.content,
        assignment.weight,
        or_unset(assignment.pickup_date),
        or_unset(assignment.pickup_time),
    );
    build(
        NotificationKind::DriverAssigned,
        driver_email,
        "New Order Assigned to you",
        body,
    )
}

pub fn delivery_otp(order: &Order, otp: &Otp) -> Notification {
    let body = format!(
        "Dear {},\n\
         Your order with ID {} has been picked up and is on its way.\n\
         Please provide the following OTP to the delivery driver upon arrival:\n\
         OTP: {otp}\n\n\
         {SIGN_OFF}",
        order.name, order.id
    );
    build(NotificationKind::DeliveryOtp, &order.email, "Your Delivery OTP", body)
}

pub fn order_delivered(order: &Order) -> Notification {
    let body = format!(
        "Dear {},\n\
         Your order (ID: {}) has been successfully delivered.\n\n\
         {SIGN_OFF}",
        order.name, order.id
    );
    build(NotificationKind::OrderDelivered, &order.email, "Order Delivered", body)
}
