pub mod chrome;
pub mod form;
pub mod form_widget;
pub mod list_view;
pub mod palette;
pub mod preview;
pub mod status_bar;
